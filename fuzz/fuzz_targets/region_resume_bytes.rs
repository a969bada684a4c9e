#![no_main]

use libfuzzer_sys::fuzz_target;
use slotkit::pool::{FixedObjectPool, ResumePolicy};
use slotkit::store::ShmRegion;

// Fuzz resume over a corrupted region
//
// A valid region is built, then overwritten with fuzz bytes at fuzz offsets.
// Resume must either fail cleanly or hand back a pool whose chains check out.
fuzz_target!(|data: &[u8]| {
    const CAPACITY: usize = 16;

    let mut region = ShmRegion::zeroed(
        FixedObjectPool::<u32>::mem_size(CAPACITY),
        FixedObjectPool::<u32>::required_align(),
    );
    {
        let Ok(mut pool) = FixedObjectPool::<u32>::construct(region.as_mut_slice(), CAPACITY) else {
            return;
        };
        for i in 0..12 {
            pool.create(i);
        }
        for id in [3, 7, 8] {
            pool.remove(id);
        }
    }

    let len = region.len();
    let bytes = region.as_mut_slice();
    for patch in data.chunks_exact(3) {
        let offset = usize::from(u16::from_le_bytes([patch[0], patch[1]])) % len;
        bytes[offset] = patch[2];
    }

    if let Ok(mut pool) = FixedObjectPool::<u32>::resume(region.as_mut_slice(), ResumePolicy::Ignore)
    {
        assert!(pool.as_free_list().check_invariants().is_ok());
        let capacity = pool.capacity().unwrap_or(0);
        assert!(pool.len() <= capacity && capacity <= CAPACITY);
        let ids: Vec<usize> = pool.as_free_list().indices().collect();
        for id in ids {
            assert!(pool.remove(id).is_some());
        }
        assert!(pool.is_empty());
        while pool.create(0).is_some() {}
        assert_eq!(pool.len(), capacity);
    }
});
