//! Criterion benchmarks for the frame cache hot paths.
//!
//! A busy vehicle bus carries a few hundred distinct ids at up to several thousand
//! frames per second, and every frame goes through `FrameCache::apply`. The render
//! side builds one snapshot per tick.
//!
//! Key metrics:
//! - Apply throughput for a working set smaller and larger than the tracker
//! - Snapshot latency for a full cache
//! - Full drain → apply through `LocalBus`
//!
//! Run with: cargo bench --bench frame_cache

use can_overlay::cache::FrameCache;
use can_overlay::frame::{Frame, FrameKey};
use can_overlay::ingest::drain_and_apply;
use can_overlay::presentation::snapshot;
use can_overlay::transport::{BusEvent, CanFrame, LocalBus, Transport};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::{Duration, Instant};

/// Benchmark applying frames over working sets of different sizes.
///
/// Sets at or below `2 × display_limit` only move keys; larger sets also evict.
fn frame_cache_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_cache_apply");

    for distinct in [8u32, 40, 400] {
        let mut cache = FrameCache::new(20, Duration::from_secs(2));
        let now = Instant::now();
        let payload = vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        let mut address = 0u32;

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("apply", distinct), &distinct, |b, &n| {
            b.iter(|| {
                address = (address + 1) % n;
                let key = FrameKey::new(0, 0x100 + address);
                cache.apply(black_box(Frame::new(key, payload.clone(), now)));
            });
        });
    }

    group.finish();
}

/// Benchmark snapshot latency against a full cache.
fn frame_cache_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_cache_snapshot");

    for limit in [5usize, 20, 100] {
        let mut cache = FrameCache::new(limit, Duration::from_secs(2));
        let t0 = Instant::now();
        for address in 0..(limit as u32 * 2) {
            cache.apply(Frame::new(FrameKey::new(0, address), vec![0xAA; 8], t0));
        }
        let now = t0 + Duration::from_secs(1);

        group.bench_with_input(BenchmarkId::new("snapshot", limit), &limit, |b, &limit| {
            b.iter(|| black_box(snapshot(&cache, now, limit)));
        });
    }

    group.finish();
}

/// Benchmark one drain of a queued subscription holding a burst of events.
fn frame_cache_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_cache_drain");
    let burst = 100u32;
    group.throughput(Throughput::Elements(u64::from(burst)));

    group.bench_function("drain_burst", |b| {
        let bus = LocalBus::new();
        let mut subscription = bus.subscribe("can", false).unwrap();
        let mut cache = FrameCache::default();
        let now = Instant::now();

        b.iter(|| {
            for address in 0..burst {
                bus.publish(
                    "can",
                    BusEvent::can(vec![CanFrame::new(0, 0x100 + address % 60, vec![0x01])]),
                );
            }
            black_box(drain_and_apply(&mut subscription, &mut cache, now).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    frame_cache_apply,
    frame_cache_snapshot,
    frame_cache_drain
);
criterion_main!(benches);
