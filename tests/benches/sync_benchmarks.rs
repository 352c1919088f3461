//! # Vote Sync Benchmarks
//!
//! Hot paths of the event pipeline:
//!
//! | Path | Work per item |
//! |------|---------------|
//! | `VoteCast` decode | topic + data slice, three words |
//! | Store apply | one write lock, linear candidate scan |
//! | Candidate list decode | dynamic ABI array of tuples |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use vote_sync::codec::contract::{decode_candidates_return, encode_candidates_return};
use vote_sync::codec::{decode_vote_cast, RpcLog};
use vote_sync::{Candidate, MetaMap, VoteEvent, VoteStateStore};

fn candidates(n: u64) -> Vec<Candidate> {
    (1..=n)
        .map(|id| Candidate::new(id, format!("Candidate {id}"), id * 10))
        .collect()
}

// ============================================================================
// Event decode
// ============================================================================

fn bench_vote_cast_decode(c: &mut Criterion) {
    let log = RpcLog::vote_cast(&VoteEvent::new(7, 2, 6), "0xaa", 0);

    c.bench_function("vote_cast_decode", |b| {
        b.iter(|| decode_vote_cast(black_box(&log)))
    });
}

// ============================================================================
// Store apply
// ============================================================================

fn bench_store_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_apply");

    for size in [2u64, 16, 128] {
        let store = VoteStateStore::new();
        store.replace(7, candidates(size), MetaMap::new());
        let events: Vec<VoteEvent> = (0..1000u64)
            .map(|i| VoteEvent::new(7, i % size + 1, i))
            .collect();

        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| {
                for event in events {
                    black_box(store.apply(event));
                }
            })
        });
    }
    group.finish();
}

// ============================================================================
// Reload decode
// ============================================================================

fn bench_candidates_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidates_decode");

    for size in [2u64, 32, 256] {
        let data = encode_candidates_return(&candidates(size));
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| decode_candidates_return(black_box(data)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_vote_cast_decode,
    bench_store_apply,
    bench_candidates_decode
);
criterion_main!(benches);
