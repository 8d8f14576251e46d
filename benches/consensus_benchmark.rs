use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use raftline_consensus::log::{LogRecord, LogStore};
use raftline_core::{CommandType, LogIndex};
use raftline_replication::compute_commit_index;

fn benchmark_log_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_append");

    for size in [100usize, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut log = LogStore::default();
                for _ in 0..size {
                    log.append(LogRecord::new(1, CommandType::NewBid, Bytes::new()));
                }
                black_box(log.last_index());
            });
        });
    }

    group.finish();
}

fn benchmark_log_slice_from(c: &mut Criterion) {
    let mut log = LogStore::default();
    for _ in 0..10_000 {
        log.append(LogRecord::new(1, CommandType::NewBid, Bytes::new()));
    }

    c.bench_function("log_slice_from_midpoint", |b| {
        b.iter(|| {
            black_box(log.slice_from(LogIndex::new(5_000)));
        });
    });
}

fn benchmark_commit_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_commit_index");

    for cluster_size in [3usize, 5, 7].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(cluster_size),
            cluster_size,
            |b, &cluster_size| {
                let peer_match: Vec<LogIndex> = (0..cluster_size - 1).map(|i| LogIndex::new(i as i64)).collect();
                b.iter(|| {
                    black_box(compute_commit_index(
                        LogIndex::new(cluster_size as i64 - 1),
                        &peer_match,
                        LogIndex::NONE,
                        1,
                        |_| Some(1),
                    ));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_log_append, benchmark_log_slice_from, benchmark_commit_index);
criterion_main!(benches);
