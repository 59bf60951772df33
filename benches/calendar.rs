//! Calendar conversion benchmarks

use freelibc::time::calendar::{epoch_to_fields, fields_to_epoch};
use freelibc::time::strftime::strftime;

use criterion::{black_box, Criterion};

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("gmtime_far_future", |b| {
        b.iter(|| epoch_to_fields(black_box(253_402_300_799)))
    });

    let fields = epoch_to_fields(1_709_175_845);
    c.bench_function("mktime_leap_day", |b| {
        b.iter(|| fields_to_epoch(black_box(&fields)))
    });

    c.bench_function("strftime_iso", |b| {
        b.iter(|| strftime("%Y-%m-%dT%H:%M:%S %a %j", black_box(&fields)))
    });
}
