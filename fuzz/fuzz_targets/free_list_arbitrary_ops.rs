#![no_main]

use libfuzzer_sys::fuzz_target;
use slotkit::ds::FreeList;

// Fuzz arbitrary operation sequences on growable and fixed FreeLists
//
// Both lists see the same operations; chain invariants are checked after each.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let capacity = usize::from(data[0] % 32) + 1;
    let mut growable: FreeList<u32> = FreeList::new();
    let mut fixed = FreeList::<u32, _>::fixed(capacity);
    let mut ids = Vec::new();

    let mut idx = 1;
    while idx + 1 < data.len() {
        let op = data[idx] % 6;
        let value = u32::from(data[idx + 1]);

        match op {
            0 | 1 => {
                // create
                let a = growable.create(value);
                let b = fixed.create(value);
                assert!(a.is_some());
                if let Some(id) = a {
                    assert_eq!(growable.get(id), Some(&value));
                    ids.push(id);
                }
                if b.is_none() {
                    assert_eq!(fixed.len(), capacity);
                }
            }
            2 => {
                // remove
                if !ids.is_empty() {
                    let id = ids.swap_remove(value as usize % ids.len());
                    let old_len = growable.len();
                    if growable.remove(id).is_some() {
                        assert_eq!(growable.len(), old_len - 1);
                        assert!(!growable.contains(id));
                    }
                }
                fixed.remove(value as usize % capacity);
            }
            3 => {
                // get_mut
                if let Some(id) = growable.first_index() {
                    if let Some(slot) = growable.get_mut(id) {
                        *slot = value;
                    }
                    assert_eq!(growable.get(id), Some(&value));
                }
            }
            4 => {
                // navigation
                let forward: Vec<usize> = growable.indices().collect();
                let mut backward = Vec::new();
                let mut cur = growable.last_index();
                while let Some(id) = cur {
                    backward.push(id);
                    cur = growable.prev_index(id);
                }
                backward.reverse();
                assert_eq!(forward, backward);
            }
            5 => {
                // clear
                growable.clear();
                fixed.clear();
                ids.clear();
                assert!(growable.is_empty());
                assert_eq!(fixed.free_count(), Some(capacity));
            }
            _ => unreachable!(),
        }

        assert!(growable.check_invariants().is_ok());
        assert!(fixed.check_invariants().is_ok());
        assert_eq!(growable.iter().count(), growable.len());
        assert_eq!(fixed.iter().count(), fixed.len());

        idx += 2;
    }
});
