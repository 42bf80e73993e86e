//! Parallel Buffer Pool Tests
//!
//! Routing, round-robin allocation and whole-pool operations across shards,
//! against both disk managers.

use sharddb::buffer::ParallelBufferPoolManager;
use sharddb::storage::{FileDiskManager, MemoryDiskManager};
use sharddb::{BufferPoolConfig, Error, PageId};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const NUM_INSTANCES: usize = 5;
const POOL_SIZE: usize = 10;

fn create_pool() -> (ParallelBufferPoolManager, Arc<MemoryDiskManager>) {
    let disk = Arc::new(MemoryDiskManager::new());
    (
        ParallelBufferPoolManager::new(NUM_INSTANCES, POOL_SIZE, disk.clone()),
        disk,
    )
}

#[test]
fn test_round_robin_is_fair() {
    let (pool, _disk) = create_pool();

    let mut per_shard: HashMap<u32, usize> = HashMap::new();
    for _ in 0..(NUM_INSTANCES * 4) {
        let (pid, _) = pool.new_page().unwrap();
        *per_shard.entry(pid.0 % NUM_INSTANCES as u32).or_default() += 1;
        pool.unpin_page(pid, false).unwrap();
    }

    assert_eq!(per_shard.len(), NUM_INSTANCES);
    assert!(per_shard.values().all(|&n| n == 4));
}

#[test]
fn test_every_page_is_served_by_its_owner() {
    let (pool, _disk) = create_pool();

    let ids: Vec<PageId> = (0..20)
        .map(|i| {
            let mut guard = pool.create_page().unwrap();
            guard.as_mut_slice()[0] = i as u8;
            guard.page_id()
        })
        .collect();

    for (i, pid) in ids.iter().enumerate() {
        let owner = pool.get_buffer_pool_manager(*pid);
        assert!(owner.shard().owns(*pid));
        assert!(owner.is_resident(*pid));

        let guard = pool.read_page(*pid).unwrap();
        assert_eq!(guard.as_slice()[0], i as u8);
    }

    // No other instance knows the page.
    for pid in &ids {
        let holders = pool
            .instances()
            .iter()
            .filter(|bpm| bpm.is_resident(*pid))
            .count();
        assert_eq!(holders, 1);
    }
}

#[test]
fn test_new_page_fills_every_instance_before_failing() {
    let (pool, _disk) = create_pool();

    let mut pinned = Vec::new();
    for _ in 0..pool.pool_size() {
        pinned.push(pool.new_page().unwrap().0);
    }
    assert!(matches!(pool.new_page(), Err(Error::PoolExhausted)));
    assert!(matches!(pool.create_page(), Err(Error::PoolExhausted)));

    // One free frame anywhere is enough.
    let victim = pinned[7];
    pool.unpin_page(victim, true).unwrap();
    let (pid, _) = pool.new_page().unwrap();
    assert_eq!(pid.0 % NUM_INSTANCES as u32, victim.0 % NUM_INSTANCES as u32);
    assert!(!pool.get_buffer_pool_manager(victim).is_resident(victim));
}

#[test]
fn test_delete_and_flush_are_routed() {
    let (pool, disk) = create_pool();

    let ids: Vec<PageId> = (0..10)
        .map(|_| {
            let (pid, _) = pool.new_page().unwrap();
            pool.unpin_page(pid, true).unwrap();
            pid
        })
        .collect();

    pool.flush_page(ids[0]).unwrap();
    assert_eq!(disk.num_writes(), 1);
    assert_eq!(pool.flush_all_pages(), 9);
    assert_eq!(pool.stats().pages_written, 10);

    pool.fetch_page(ids[3]).unwrap();
    assert!(matches!(
        pool.delete_page(ids[3]),
        Err(Error::PagePinned(_, 1))
    ));
    pool.unpin_page(ids[3], false).unwrap();
    pool.delete_page(ids[3]).unwrap();
    assert!(!disk.is_allocated(ids[3]));
}

#[test]
fn test_file_backed_pool_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("parallel.db");
    let config = BufferPoolConfig::new(4).with_instances(3);

    let ids: Vec<PageId> = {
        let disk = Arc::new(FileDiskManager::create(&path).unwrap());
        let pool = ParallelBufferPoolManager::from_config(&config, disk).unwrap();
        let ids = (0..30u8)
            .map(|i| {
                let mut guard = pool.create_page().unwrap();
                guard.as_mut_slice()[10] = i;
                guard.page_id()
            })
            .collect();
        pool.flush_all_pages();
        ids
    };

    let disk = Arc::new(FileDiskManager::open(&path).unwrap());
    let pool = ParallelBufferPoolManager::from_config(&config, disk).unwrap();
    for (i, pid) in ids.iter().enumerate() {
        let guard = pool.read_page(*pid).unwrap();
        assert_eq!(guard.as_slice()[10], i as u8);
    }
}

#[test]
fn test_concurrent_mixed_workload() {
    let (pool, _disk) = create_pool();
    let pool = Arc::new(pool);

    let handles: Vec<_> = (0..8u8)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut mine = Vec::new();
                for i in 0..20u8 {
                    let pid = loop {
                        match pool.create_page() {
                            Ok(mut guard) => {
                                guard.as_mut_slice()[0] = t;
                                guard.as_mut_slice()[1] = i;
                                break guard.page_id();
                            }
                            Err(Error::PoolExhausted) => thread::yield_now(),
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    };
                    mine.push(pid);
                }
                for (i, pid) in mine.iter().enumerate() {
                    let guard = loop {
                        match pool.read_page(*pid) {
                            Ok(guard) => break guard,
                            Err(Error::PoolExhausted) => thread::yield_now(),
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    };
                    assert_eq!(guard.as_slice()[0], t);
                    assert_eq!(guard.as_slice()[1], i as u8);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    for bpm in pool.instances() {
        assert_eq!(bpm.evictable_count(), bpm.page_count());
    }
}
