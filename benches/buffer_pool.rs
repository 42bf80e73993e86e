//! Buffer pool benchmarks.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sharddb::buffer::replacer::LruReplacer;
use sharddb::buffer::{BufferPoolManager, ParallelBufferPoolManager};
use sharddb::index::btree::{GenericComparator, GenericKey, LeafPage, RecordId};
use sharddb::storage::MemoryDiskManager;
use sharddb::{FrameId, Page, PageId};

fn lru_churn_benchmark(c: &mut Criterion) {
    let replacer = LruReplacer::new(1024);

    c.bench_function("lru_unpin_victim_1024", |b| {
        b.iter(|| {
            for i in 0..1024 {
                replacer.unpin(FrameId::new(i));
            }
            while let Some(frame_id) = replacer.victim() {
                black_box(frame_id);
            }
        })
    });
}

fn fetch_hit_benchmark(c: &mut Criterion) {
    let bpm = BufferPoolManager::new(64, Arc::new(MemoryDiskManager::new()));
    let ids: Vec<PageId> = (0..64)
        .map(|_| {
            let (pid, _) = bpm.new_page().unwrap();
            bpm.unpin_page(pid, false).unwrap();
            pid
        })
        .collect();

    c.bench_function("bpm_fetch_hit_64", |b| {
        b.iter(|| {
            for pid in &ids {
                let frame = bpm.fetch_page(*pid).unwrap();
                black_box(frame.pin_count());
                bpm.unpin_page(*pid, false).unwrap();
            }
        })
    });
}

fn fetch_evict_benchmark(c: &mut Criterion) {
    let bpm = BufferPoolManager::new(16, Arc::new(MemoryDiskManager::new()));
    let ids: Vec<PageId> = (0..256)
        .map(|_| {
            let (pid, _) = bpm.new_page().unwrap();
            bpm.unpin_page(pid, true).unwrap();
            pid
        })
        .collect();

    c.bench_function("bpm_fetch_evict_256_over_16", |b| {
        b.iter(|| {
            for pid in &ids {
                let guard = bpm.read_page(*pid).unwrap();
                black_box(guard.as_slice()[0]);
            }
        })
    });
}

fn parallel_new_page_benchmark(c: &mut Criterion) {
    c.bench_function("parallel_new_page_4x64", |b| {
        b.iter(|| {
            let pool = ParallelBufferPoolManager::new(4, 64, Arc::new(MemoryDiskManager::new()));
            for _ in 0..256 {
                let (pid, _) = pool.new_page().unwrap();
                pool.unpin_page(pid, false).unwrap();
            }
            black_box(pool.stats())
        })
    });
}

fn leaf_insert_benchmark(c: &mut Criterion) {
    let cmp = GenericComparator::<8>;

    c.bench_function("leaf_insert_200", |b| {
        b.iter(|| {
            let mut page = Page::new();
            let mut leaf = LeafPage::<_, GenericKey<8>, RecordId>::new(&mut page);
            leaf.init(PageId::new(0), PageId::INVALID, 200);
            for i in 0..200i64 {
                let v = (i * 7919) % 200;
                leaf.insert(GenericKey::from_integer(v), RecordId::new(PageId::new(0), i as u32), &cmp);
            }
            black_box(leaf.size())
        })
    });
}

criterion_group!(
    benches,
    lru_churn_benchmark,
    fetch_hit_benchmark,
    fetch_evict_benchmark,
    parallel_new_page_benchmark,
    leaf_insert_benchmark,
);
criterion_main!(benches);
