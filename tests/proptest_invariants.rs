//! Property tests: random operation sequences against the pool and the
//! replacer, checked against simple models.

use std::collections::{HashMap, HashSet, VecDeque};

use proptest::prelude::*;
use shardpool::{
    BufferPoolConfig, BufferPoolInstance, Error, FrameId, LruReplacer, MemoryDiskManager, PageId,
    Replacer,
};

#[derive(Debug, Clone)]
enum PoolOp {
    New,
    Fetch(usize),
    Unpin(usize, bool),
    Flush(usize),
    Delete(usize),
}

fn pool_op() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        3 => Just(PoolOp::New),
        3 => any::<usize>().prop_map(PoolOp::Fetch),
        4 => (any::<usize>(), any::<bool>()).prop_map(|(i, d)| PoolOp::Unpin(i, d)),
        1 => any::<usize>().prop_map(PoolOp::Flush),
        1 => any::<usize>().prop_map(PoolOp::Delete),
    ]
}

#[derive(Debug, Clone)]
enum ReplacerOp {
    Victim,
    Pin(usize),
    Unpin(usize),
}

fn replacer_op(capacity: usize) -> impl Strategy<Value = ReplacerOp> {
    prop_oneof![
        Just(ReplacerOp::Victim),
        (0..capacity).prop_map(ReplacerOp::Pin),
        (0..capacity).prop_map(ReplacerOp::Unpin),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Pin counts track a model of outstanding pins, and the structural
    /// invariants hold after every operation.
    #[test]
    fn prop_pool_matches_pin_model(
        pool_size in 1usize..6,
        ops in prop::collection::vec(pool_op(), 1..120),
    ) {
        let disk = MemoryDiskManager::new();
        let pool = BufferPoolInstance::new(pool_size, disk.clone());

        // Every id ever issued, and the pins we believe are outstanding.
        let mut issued: Vec<PageId> = Vec::new();
        let mut pins: HashMap<PageId, u32> = HashMap::new();
        let mut deleted: HashSet<PageId> = HashSet::new();

        for op in ops {
            match op {
                PoolOp::New => match pool.new_page() {
                    Ok((pid, _)) => {
                        prop_assert!(!issued.contains(&pid));
                        issued.push(pid);
                        pins.insert(pid, 1);
                    }
                    Err(Error::PoolExhausted) => {
                        let pinned = pins.values().filter(|&&c| c > 0).count();
                        prop_assert_eq!(pinned, pool_size);
                    }
                    Err(err) => prop_assert!(false, "new_page: {}", err),
                },
                PoolOp::Fetch(i) if !issued.is_empty() => {
                    let pid = issued[i % issued.len()];
                    match pool.fetch_page(pid) {
                        Ok(frame) => {
                            prop_assert_eq!(frame.page_id(), pid);
                            *pins.entry(pid).or_insert(0) += 1;
                        }
                        Err(Error::PoolExhausted) => {
                            prop_assert!(pool.frame_id_of(pid).is_none());
                        }
                        Err(err) => prop_assert!(false, "fetch_page: {}", err),
                    }
                }
                PoolOp::Unpin(i, dirty) if !issued.is_empty() => {
                    let pid = issued[i % issued.len()];
                    let resident = pool.frame_id_of(pid).is_some();
                    let result = pool.unpin_page(pid, dirty);
                    prop_assert_eq!(result.is_ok(), resident);
                    if let Some(count) = pins.get_mut(&pid) {
                        *count = count.saturating_sub(1);
                    }
                }
                PoolOp::Flush(i) if !issued.is_empty() => {
                    let pid = issued[i % issued.len()];
                    if pool.flush_page(pid).is_ok() {
                        prop_assert_eq!(pool.is_dirty(pid), Some(false));
                        prop_assert!(disk.contains(pid));
                    }
                }
                PoolOp::Delete(i) if !issued.is_empty() => {
                    let pid = issued[i % issued.len()];
                    match pool.delete_page(pid) {
                        Ok(()) => {
                            prop_assert!(pool.frame_id_of(pid).is_none());
                            pins.remove(&pid);
                            deleted.insert(pid);
                        }
                        Err(Error::PageBusy(busy, count)) => {
                            prop_assert_eq!(busy, pid);
                            prop_assert_eq!(Some(&count), pins.get(&pid));
                        }
                        Err(err) => prop_assert!(false, "delete_page: {}", err),
                    }
                }
                _ => {}
            }

            for (&pid, &count) in &pins {
                match pool.get_pin_count(pid) {
                    Some(actual) => prop_assert_eq!(actual, count, "{}", pid),
                    None => prop_assert_eq!(count, 0, "{} evicted while pinned", pid),
                }
            }
            prop_assert!(pool.page_count() + pool.free_frame_count() == pool_size);
            pool.check_invariants();
        }

        // Deleted ids are never handed out again.
        let fresh = pool.allocate_page().unwrap();
        prop_assert!(!deleted.contains(&fresh));
    }

    /// The intrusive list evicts in the same order as a linear-scan model.
    #[test]
    fn prop_lru_matches_queue_model(
        (capacity, ops) in (1usize..16).prop_flat_map(|capacity| {
            (Just(capacity), prop::collection::vec(replacer_op(capacity), 0..200))
        }),
    ) {
        let replacer = LruReplacer::new(capacity);
        let mut model: VecDeque<usize> = VecDeque::new();

        for op in ops {
            match op {
                ReplacerOp::Victim => {
                    prop_assert_eq!(replacer.victim(), model.pop_front().map(FrameId::new));
                }
                ReplacerOp::Pin(id) => {
                    replacer.pin(FrameId::new(id));
                    model.retain(|&x| x != id);
                }
                ReplacerOp::Unpin(id) => {
                    replacer.unpin(FrameId::new(id));
                    if !model.contains(&id) {
                        model.push_back(id);
                    }
                }
            }
            prop_assert_eq!(replacer.size(), model.len());
            prop_assert!(replacer.size() <= replacer.capacity());
        }

        let order: Vec<FrameId> = model.iter().copied().map(FrameId::new).collect();
        prop_assert_eq!(replacer.eviction_order(), order);
    }

    /// Sibling shards never issue the same id, and every id lands on the
    /// shard that issued it.
    #[test]
    fn prop_shards_issue_disjoint_ids(
        num_instances in 1u32..6,
        allocations in 1usize..40,
    ) {
        let shards: Vec<_> = (0..num_instances)
            .map(|idx| {
                let config = BufferPoolConfig::new(1)
                    .with_num_instances(num_instances)
                    .with_instance_index(idx);
                BufferPoolInstance::with_config(config, MemoryDiskManager::new()).unwrap()
            })
            .collect();

        let mut seen = HashSet::new();
        for shard in &shards {
            for _ in 0..allocations {
                let pid = shard.allocate_page().unwrap();
                prop_assert_eq!(pid.shard(num_instances), shard.instance_index());
                prop_assert!(seen.insert(pid), "{} issued twice", pid);
            }
        }
    }
}
