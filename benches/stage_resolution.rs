//! Stage resolution and guard throughput benchmarks.
#![allow(missing_docs)]

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stagegate::domain::models::{
    Baseline, CanonicalStatus, EngagementId, ObserverId, Quote, QuoteId, QuotePatch,
};
use stagegate::infrastructure::navigation::RecordingNavigator;
use stagegate::services::route_guard::RouteGuard;
use stagegate::services::route_table::RouteTable;
use stagegate::services::stage_resolver::{resolve, resolve_target};

fn quotes(n: usize) -> Vec<Quote> {
    let statuses = [
        CanonicalStatus::Pending,
        CanonicalStatus::Approved,
        CanonicalStatus::Closing,
        CanonicalStatus::Negotiating,
    ];
    (0..n)
        .map(|i| {
            Quote::new(format!("q{i:05}").as_str(), statuses[i % statuses.len()])
                .selected(i % 3 == 0)
                .visible(i % 5 != 0)
        })
        .collect()
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for size in [4, 64, 1_024] {
        let set = quotes(size);
        group.bench_with_input(BenchmarkId::new("stage", size), &set, |b, set| {
            b.iter(|| resolve(black_box(set)));
        });
        group.bench_with_input(BenchmarkId::new("target", size), &set, |b, set| {
            b.iter(|| resolve_target(black_box(set)));
        });
    }
    group.finish();
}

fn bench_guard_events(c: &mut Criterion) {
    c.bench_function("guard_event_64_quotes", |b| {
        let mut guard = RouteGuard::new(
            EngagementId::new("bench"),
            ObserverId::new(),
            RouteTable::default(),
            Arc::new(RecordingNavigator::new()),
        );
        let baseline = Baseline::from_quotes(quotes(64));
        let current = RouteTable::default().route_for(
            &EngagementId::new("bench"),
            &resolve_target(&baseline.quotes),
        );
        guard.initialize(Ok(baseline), current);

        let id = QuoteId::new("q00001");
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let patch = QuotePatch::new().visible(flip);
            black_box(guard.on_quote_event(&id, &patch))
        });
    });
}

criterion_group!(benches, bench_resolve, bench_guard_events);
criterion_main!(benches);
