//! DHAT heap profiler for slotkit.
//!
//! Run with: cargo run --bin dhat_profile --release --features dhat-heap
//! View results: Open dhat-heap.json in <https://nnethercote.github.io/dh_view/dh_view.html>

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use slotkit::builder::LruManagerBuilder;
use slotkit::ds::FreeList;
use slotkit::policy::LruPool;
use slotkit::pool::{FixedObjectPool, KeyedObjectPool, ObjectPool, ResumePolicy};
use slotkit::store::region::ShmRegion;

/// Simple XorShift64 RNG for deterministic workloads.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

/// Random create/remove mix; `step(true, r)` asks for a create and
/// `step(false, r)` for a remove.
fn churn<F: FnMut(bool, u64)>(operations: usize, seed: u64, mut step: F) {
    let mut rng = XorShift64::new(seed);
    for _ in 0..operations {
        let r = rng.next_u64();
        step(r % 3 != 0, r >> 8);
    }
}

fn profile_free_list() {
    println!("=== Profiling FreeList (growable) ===");
    let mut list = FreeList::with_capacity(1024);
    let mut live = Vec::new();
    churn(200_000, 42, |create, r| {
        if create {
            if let Some(id) = list.create(r) {
                live.push(id);
            }
        } else if !live.is_empty() {
            let id = live.swap_remove(r as usize % live.len());
            list.remove(id);
        }
    });
    println!("  Final size: {} (slots {})", list.len(), list.storage_len());
}

fn profile_object_pool() {
    println!("=== Profiling ObjectPool ===");
    let mut pool = ObjectPool::new();
    let mut live = Vec::new();
    churn(200_000, 7, |create, r| {
        if create {
            if let Some(entry) = pool.create(vec![r; 4]) {
                live.push(entry.id());
            }
        } else if !live.is_empty() {
            let id = live.swap_remove(r as usize % live.len());
            pool.remove(id);
        }
    });
    println!("  Final size: {}", pool.len());
}

fn profile_keyed_pool() {
    println!("=== Profiling KeyedObjectPool ===");
    let mut pool = KeyedObjectPool::new();
    churn(200_000, 11, |create, r| {
        let key = r % 8192;
        if !create || pool.create_by_key(key, r).is_err() {
            pool.remove_by_key(&key);
        }
    });
    println!("  Final size: {}", pool.len());
}

fn profile_fixed_region() {
    println!("=== Profiling fixed region construct/resume ===");
    let capacity = 16_384;
    let mut region = ShmRegion::zeroed(
        FixedObjectPool::<u64>::mem_size(capacity),
        FixedObjectPool::<u64>::required_align(),
    );
    for round in 0..8u64 {
        let buf = region.as_mut_slice();
        let pool = if round == 0 {
            FixedObjectPool::<u64>::construct(buf, capacity).map_err(|e| e.to_string())
        } else {
            FixedObjectPool::<u64>::resume(buf, ResumePolicy::Log).map_err(|e| e.to_string())
        };
        let mut pool = match pool {
            Ok(pool) => pool,
            Err(err) => {
                eprintln!("  attach failed: {err}");
                return;
            }
        };
        while pool.create(round).is_some() {}
        let ids: Vec<_> = pool.iter().map(|e| e.id()).step_by(2).collect();
        for id in ids {
            pool.remove(id);
        }
    }
    println!("  Region bytes: {}", region.len());
}

fn profile_lru_pool() {
    println!("=== Profiling LruPool ===");
    let mgr = LruManagerBuilder::new().item_max_bound(4096).build_shared();
    let mut pool: LruPool<u64, Vec<u8>> = LruPool::new();
    pool.init(mgr.clone());
    let mut rng = XorShift64::new(99);
    for i in 0..200_000u64 {
        let key = rng.next_u64() % 512;
        if rng.next_u64() % 2 == 0 {
            pool.push(key, Vec::with_capacity(64));
        } else if pool.pull(&key).is_none() {
            pool.push(key, Vec::with_capacity(64));
        }
        if i % 1024 == 0 {
            mgr.borrow_mut().proc();
        }
    }
    println!(
        "  Final size: {} (manager items {})",
        pool.len(),
        mgr.borrow().item_count()
    );
}

fn main() {
    let _profiler = dhat::Profiler::new_heap();

    println!("slotkit DHAT Heap Profiling");
    println!("===========================\n");

    profile_free_list();
    profile_object_pool();
    profile_keyed_pool();
    profile_fixed_region();
    profile_lru_pool();

    println!("\n===========================");
    println!("Profile written to dhat-heap.json");
}
