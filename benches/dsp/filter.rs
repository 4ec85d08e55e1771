//! Benchmarks for the sample smoothing filter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use rompler_dsp::dsp::filter::SmoothingFilter;
use rompler_dsp::rom::ROM_SAMPLE_RATE;

use crate::BLOCK_SIZES;

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        // Generate a test signal (sawtooth-like ramp)
        let input: Vec<f64> = (0..size)
            .map(|i| (i as f64 / size as f64) * 2.0 - 1.0)
            .collect();

        // Two stages in series, as the wave cursor runs them
        let mut first = SmoothingFilter::for_native_rate(ROM_SAMPLE_RATE);
        let mut second = SmoothingFilter::for_native_rate(ROM_SAMPLE_RATE);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("two_stage", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                first.render(black_box(&mut buffer));
                second.render(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
