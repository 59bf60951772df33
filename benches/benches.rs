pub mod calendar;

use criterion::{criterion_group, criterion_main};

criterion_group!(
    benches,
    alloc::criterion_benchmark,
    calendar::criterion_benchmark,
    math::criterion_benchmark,
    text::criterion_benchmark
);
criterion_main!(benches);
