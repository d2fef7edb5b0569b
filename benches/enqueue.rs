//! Benchmarks for the producer path and the Logstash formatter.

use std::{io, time::Duration};

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use logstash_hook::{
    Connection, FormatOptions, HookBuilder, Level, LogRecord, LogstashFormatter,
    OverflowPolicy, RecordFormatter,
};

struct NullConnection;

impl Connection for NullConnection {
    fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn write_payload(&mut self, payload: &[u8]) -> io::Result<()> {
        black_box(payload);
        Ok(())
    }
}

fn sample_record() -> LogRecord {
    LogRecord::new(Level::Info, "request handled")
        .with_field("status", 200)
        .with_field("path", "/api/v1/orders")
        .with_field("latency_ms", 12.5)
        .with_field("->trace_id", "4bf92f3577b34da6")
}

fn bench_format(c: &mut Criterion) {
    let record = sample_record();
    let options = FormatOptions {
        app_name: "bench",
        exclude_prefix: "->",
        time_format: None,
    };
    c.bench_function("format_logstash_event", |b| {
        b.iter(|| LogstashFormatter.format(black_box(&record), &options))
    });
}

fn bench_fire(c: &mut Criterion) {
    let hook = HookBuilder::new("tcp", "bench.invalid:5000", "bench")
        .with_field("env", "bench")
        .with_prefix("->")
        .with_overflow_policy(OverflowPolicy::Block)
        .with_connection(Box::new(NullConnection))
        .build()
        .expect("build hook");
    c.bench_function("fire_and_flush_100", |b| {
        b.iter_batched(
            || (0..100).map(|_| sample_record()).collect::<Vec<_>>(),
            |records| {
                for record in records {
                    hook.fire(record);
                }
                hook.flush(Duration::from_secs(5)).expect("flush");
            },
            BatchSize::SmallInput,
        )
    });
    hook.close();
}

criterion_group!(benches, bench_format, bench_fire);
criterion_main!(benches);
