use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use slotkit::builder::LruManagerBuilder;
use slotkit::policy::{LruPool, LruPoolManager};

fn bench_lru_pool_push_pull(c: &mut Criterion) {
    c.bench_function("lru_pool_push_pull", |b| {
        b.iter_batched(
            || {
                let mgr = LruPoolManager::create();
                let mut pool: LruPool<u32, u64> = LruPool::new();
                pool.init(mgr.clone());
                (mgr, pool)
            },
            |(_mgr, mut pool)| {
                for i in 0..1024u32 {
                    pool.push(std::hint::black_box(i % 64), u64::from(i));
                }
                for i in 0..1024u32 {
                    std::hint::black_box(pool.pull(&(i % 64)));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_lru_pool_push_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_pool_push_eviction");
    for max_bound in [64usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(max_bound), &max_bound, |b, &max| {
            b.iter_batched(
                || {
                    let mgr = LruManagerBuilder::new().item_max_bound(max).build_shared();
                    let mut pool: LruPool<u32, Vec<u8>> = LruPool::new();
                    pool.init(mgr.clone());
                    (mgr, pool)
                },
                |(mgr, mut pool)| {
                    for i in 0..4096u32 {
                        pool.push(i % 128, Vec::new());
                    }
                    std::hint::black_box(mgr.borrow().item_count());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_lru_manager_proc(c: &mut Criterion) {
    c.bench_function("lru_manager_proc", |b| {
        b.iter_batched(
            || {
                let mgr = LruManagerBuilder::new()
                    .item_min_bound(0)
                    .item_max_bound(usize::MAX)
                    .list_bound(usize::MAX)
                    .build_shared();
                let mut pool: LruPool<u32, u64> = LruPool::new();
                pool.init(mgr.clone());
                for i in 0..2048u32 {
                    pool.push(i % 32, u64::from(i));
                }
                mgr.borrow_mut().gc();
                (mgr, pool)
            },
            |(mgr, pool)| {
                while mgr.borrow_mut().proc() > 0 {}
                std::hint::black_box(pool.len());
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_lru_pool_push_pull,
    bench_lru_pool_push_eviction,
    bench_lru_manager_proc
);
criterion_main!(benches);
