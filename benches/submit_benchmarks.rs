use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use rolling_appender::appender::AppenderBuilder;
use rolling_appender::domain::{LogEvent, LogLevel};
use rolling_appender::render::{JsonRenderer, PatternRenderer, Renderer};
use std::hint::black_box;
use tempfile::TempDir;

fn sample_event() -> LogEvent {
    LogEvent::new(LogLevel::Info, "bench.orders", "order 4711 accepted for customer 42")
        .with_context("request_id", "7f3c2a")
        .with_thread_name("worker-3")
}

fn benchmark_rendering(c: &mut Criterion) {
    let event = sample_event();
    let mut group = c.benchmark_group("rendering");
    group.throughput(Throughput::Elements(1));

    group.bench_function("pattern", |b| {
        let renderer = PatternRenderer::default();
        b.iter(|| renderer.render(black_box(&event)));
    });

    group.bench_function("json", |b| {
        let renderer = JsonRenderer;
        b.iter(|| renderer.render(black_box(&event)));
    });

    group.finish();
}

fn benchmark_submit(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut group = c.benchmark_group("submit");
    group.throughput(Throughput::Elements(1));

    group.bench_function("queued_blocking", |b| {
        let appender = AppenderBuilder::new(dir.path().join("queued.log"))
            .buffer_capacity(1024)
            .build()
            .unwrap();
        b.iter(|| appender.submit(black_box(sample_event())));
        appender.close();
    });

    group.bench_function("queued_non_blocking", |b| {
        let appender = AppenderBuilder::new(dir.path().join("lossy.log"))
            .buffer_capacity(1024)
            .blocking(false)
            .build()
            .unwrap();
        b.iter(|| appender.submit(black_box(sample_event())));
        appender.close();
    });

    group.bench_function("synchronous", |b| {
        let appender = AppenderBuilder::new(dir.path().join("sync.log"))
            .buffer_capacity(0)
            .build()
            .unwrap();
        b.iter(|| appender.submit(black_box(sample_event())));
        appender.close();
    });

    group.finish();
}

criterion_group!(benches, benchmark_rendering, benchmark_submit);
criterion_main!(benches);
