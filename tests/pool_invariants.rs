// ==============================================
// POOL INVARIANT TESTS (integration)
// ==============================================
//
// Random operation sequences against a model map; after every step the
// used and free chains must check out and agree with the model.

use std::collections::BTreeMap;

use proptest::prelude::*;
use slotkit::ds::FreeList;
use slotkit::pool::{KeyedObjectPool, ObjectPool};
use slotkit::store::SlotStorage;

#[derive(Debug, Clone)]
enum Op {
    Create(u32),
    Remove(usize),
    Update(usize, u32),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => any::<u32>().prop_map(Op::Create),
        4 => (0usize..96).prop_map(Op::Remove),
        2 => (0usize..96, any::<u32>()).prop_map(|(i, v)| Op::Update(i, v)),
        1 => Just(Op::Clear),
    ]
}

fn assert_matches_model<S: SlotStorage<u32>>(
    list: &FreeList<u32, S>,
    model: &BTreeMap<usize, u32>,
) -> Result<(), TestCaseError> {
    prop_assert!(list.check_invariants().is_ok(), "{:?}", list.check_invariants());
    prop_assert_eq!(list.len(), model.len());
    prop_assert_eq!(list.iter().count(), model.len());
    let live: BTreeMap<usize, u32> = list.iter().map(|(id, v)| (id, *v)).collect();
    prop_assert_eq!(&live, model);
    for id in 0..list.storage_len() {
        prop_assert_eq!(list.contains(id), model.contains_key(&id));
    }
    if let (Some(capacity), Some(free)) = (list.capacity(), list.free_count()) {
        prop_assert_eq!(list.len() + free, capacity);
    }
    Ok(())
}

fn run_ops<S: SlotStorage<u32>>(
    list: &mut FreeList<u32, S>,
    ops: Vec<Op>,
    capacity: Option<usize>,
) -> Result<(), TestCaseError> {
    let mut model = BTreeMap::new();
    for op in ops {
        match op {
            Op::Create(v) => match list.create(v) {
                Some(id) => {
                    prop_assert!(!model.contains_key(&id), "id {} handed out twice", id);
                    model.insert(id, v);
                }
                None => prop_assert_eq!(Some(model.len()), capacity),
            },
            Op::Remove(id) => {
                prop_assert_eq!(list.remove(id), model.remove(&id));
            }
            Op::Update(id, v) => {
                if let Some(slot) = list.get_mut(id) {
                    *slot = v;
                    model.insert(id, v);
                } else {
                    prop_assert!(!model.contains_key(&id));
                }
            }
            Op::Clear => {
                list.clear();
                model.clear();
            }
        }
        assert_matches_model(list, &model)?;
    }
    Ok(())
}

proptest! {
    /// Growable lists keep both chains consistent under arbitrary churn.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_growable_list_matches_model(ops in prop::collection::vec(op_strategy(), 0..300)) {
        let mut list = FreeList::new();
        run_ops(&mut list, ops, None)?;
    }

    /// Fixed lists fail creation exactly when full.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_fixed_list_matches_model(
        capacity in 1usize..64,
        ops in prop::collection::vec(op_strategy(), 0..300)
    ) {
        let mut list = FreeList::fixed(capacity);
        run_ops(&mut list, ops, Some(capacity))?;
    }

    /// Growable storage never keeps vacant slots at its end.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_growable_storage_is_trimmed(ops in prop::collection::vec(op_strategy(), 0..300)) {
        let mut list = FreeList::new();
        run_ops(&mut list, ops, None)?;
        match list.storage_len() {
            0 => prop_assert!(list.is_empty()),
            n => prop_assert!(list.contains(n - 1)),
        }
    }

    /// Object pool entries always carry the id they live at.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_object_pool_ids_are_stable(
        values in prop::collection::vec(any::<u16>(), 1..100),
        removals in prop::collection::vec(0usize..100, 0..50)
    ) {
        let mut pool = ObjectPool::new();
        for v in &values {
            pool.create(*v);
        }
        for id in removals {
            pool.remove(id);
        }
        for entry in pool.iter() {
            prop_assert_eq!(pool.get(entry.id()).map(|e| e.id()), Some(entry.id()));
        }
        prop_assert!(pool.as_free_list().check_invariants().is_ok());
    }

    /// Keyed pools keep keys unique and the index in step with the slots.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_keyed_pool_index_consistent(
        ops in prop::collection::vec((any::<bool>(), 0u32..48, any::<u32>()), 0..300)
    ) {
        let mut pool = KeyedObjectPool::try_with_buckets(7).unwrap();
        let mut model: BTreeMap<u32, u32> = BTreeMap::new();
        for (create, key, value) in ops {
            if create {
                let created = pool.create_by_key(key, value).is_ok();
                prop_assert_eq!(created, !model.contains_key(&key));
                model.entry(key).or_insert(value);
            } else {
                prop_assert_eq!(pool.remove_by_key(&key), model.remove(&key));
            }
            prop_assert!(pool.check_invariants().is_ok(), "{:?}", pool.check_invariants());
            prop_assert_eq!(pool.len(), model.len());
            for (k, v) in &model {
                let entry = pool.get_by_key(k);
                prop_assert_eq!(entry.map(|e| *e.value()), Some(*v));
                prop_assert_eq!(entry.map(|e| *e.key()), Some(*k));
            }
        }
    }
}

#[test]
fn fixed_list_reuses_slots_after_draining() {
    let mut list = FreeList::fixed(8);
    for round in 0..4u32 {
        let ids: Vec<_> = (0..8).map(|i| list.create(round * 10 + i)).collect();
        assert!(ids.iter().all(Option::is_some));
        assert!(list.create(99).is_none());
        for id in ids.into_iter().flatten() {
            assert!(list.remove(id).is_some());
        }
        assert!(list.is_empty());
        assert_eq!(list.free_count(), Some(8));
        list.check_invariants().unwrap();
    }
}
