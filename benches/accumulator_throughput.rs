//! Accumulator throughput benchmarks.
//!
//! Measures batch building, sanitization and NDJSON encoding per record.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use gateway_telemetry::pipeline::{BatchBuilder, BatchConfig, FlushTrigger};
use gateway_telemetry::{RequestRecord, ResponseRecord, Sanitizer, TelemetryRecord};

const NOW: i64 = 1_700_000_000_000;

fn create_record(body_len: usize) -> TelemetryRecord {
    let mut request = RequestRecord {
        uri: "https://api.example.com/v1/items".to_string(),
        method: "GET".to_string(),
        body: "x".repeat(body_len),
        ..Default::default()
    };
    request
        .headers
        .insert("Authorization".to_string(), vec!["Bearer token".to_string()]);
    request
        .headers
        .insert("Accept".to_string(), vec!["application/json".to_string()]);
    TelemetryRecord::new(request, ResponseRecord { status_code: 200, ..Default::default() })
        .with_date_created(NOW)
}

fn bench_batch_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_push");

    for (name, payload_len) in [("small", 256), ("medium", 4 * 1024), ("large", 64 * 1024)] {
        let payload = vec![b'x'; payload_len];
        group.throughput(Throughput::Bytes(payload_len as u64));
        group.bench_function(BenchmarkId::new("push", name), |b| {
            let mut builder = BatchBuilder::new(BatchConfig {
                max_batch_bytes: 512 * 1024,
                max_log_age: Duration::from_secs(60),
            });
            b.iter(|| {
                let flushed = builder.push(black_box(payload.clone()), NOW, NOW);
                black_box(flushed);
            })
        });
    }

    group.finish();
}

fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");
    let sanitizer = Sanitizer::default_sanitizer();

    for (name, body_len) in [("empty_body", 0), ("body_4k", 4 * 1024)] {
        let record = create_record(body_len);
        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("default", name), |b| {
            b.iter(|| black_box(sanitizer.sanitize(black_box(record.clone()))))
        });
    }

    group.finish();
}

fn bench_encode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_batch");

    for (name, records) in [("10", 10usize), ("100", 100), ("1000", 1000)] {
        let mut builder = BatchBuilder::new(BatchConfig {
            max_batch_bytes: usize::MAX,
            max_log_age: Duration::from_secs(60),
        });
        for _ in 0..records {
            let payload = serde_json::to_vec(&create_record(512)).unwrap_or_default();
            builder.push(payload, NOW, NOW);
        }
        let Some((batch, _)) = builder.take(FlushTrigger::Drain) else {
            continue;
        };

        group.throughput(Throughput::Elements(records as u64));
        group.bench_function(BenchmarkId::new("ndjson", name), |b| {
            b.iter(|| black_box(batch.to_ndjson()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_batch_push, bench_sanitize, bench_encode_batch);
criterion_main!(benches);
