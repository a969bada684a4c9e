#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use slotkit::pool::KeyedObjectPool;

// Fuzz keyed create/remove sequences against a BTreeMap model
//
// A small bucket count forces many keys into the same bucket.
fuzz_target!(|data: &[u8]| {
    let Some((&buckets, rest)) = data.split_first() else {
        return;
    };

    let Ok(mut pool) = KeyedObjectPool::<i16, u8>::try_with_buckets(usize::from(buckets % 8) + 1)
    else {
        return;
    };
    let mut model = BTreeMap::new();

    for chunk in rest.chunks_exact(3) {
        let key = i16::from_le_bytes([chunk[1], chunk[2]]) % 64;
        match chunk[0] % 4 {
            0 | 1 => {
                let created = pool.create_by_key(key, chunk[0]).is_ok();
                assert_eq!(created, !model.contains_key(&key));
                model.entry(key).or_insert(chunk[0]);
            }
            2 => {
                assert_eq!(pool.remove_by_key(&key), model.remove(&key));
            }
            3 => {
                if let Some(id) = pool.get_by_key(&key).map(|e| e.id()) {
                    assert_eq!(pool.remove(id), model.remove(&key));
                    assert!(!pool.contains_key(&key));
                }
            }
            _ => unreachable!(),
        }

        assert!(pool.check_invariants().is_ok());
        assert_eq!(pool.len(), model.len());
    }

    for (key, value) in &model {
        assert_eq!(pool.get_by_key(key).map(|e| *e.value()), Some(*value));
    }
});
