//! Benchmarks for the AHDSR envelope generator.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use rompler_dsp::dsp::envelope::{Envelope, EnvelopeControls, EnvelopeDef, EnvelopeShape};

use crate::BLOCK_SIZES;

const SAMPLE_RATE: u32 = 44_100;

fn def(shape: EnvelopeShape) -> EnvelopeDef {
    EnvelopeDef::new([1.0, 1.0, 0.6, 0.6, 0.0], [90, 40, 90, 0, 80], [shape; 5])
}

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");
    let controls = EnvelopeControls::default();

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f64; size];

        // Attack phase (linear ramp)
        let mut env = Envelope::new(&def(EnvelopeShape::Linear), 60, SAMPLE_RATE);
        env.start(&controls);
        group.bench_with_input(BenchmarkId::new("linear", size), &size, |b, _| {
            b.iter(|| {
                env.render(black_box(&mut buffer), black_box(&controls));
            })
        });

        // Logarithmic ramps pay for a ln() per sample
        let mut env = Envelope::new(&def(EnvelopeShape::Logarithmic), 60, SAMPLE_RATE);
        env.start(&controls);
        group.bench_with_input(BenchmarkId::new("logarithmic", size), &size, |b, _| {
            b.iter(|| {
                env.render(black_box(&mut buffer), black_box(&controls));
            })
        });

        // Sustain phase (holding steady)
        let sustain = EnvelopeDef::linear([1.0, 1.0, 0.6, 0.6, 0.0], [0, 0, 0, 0, 0]);
        let mut env = Envelope::new(&sustain, 60, SAMPLE_RATE);
        env.start(&controls);
        for _ in 0..200 {
            env.next_value(&controls);
        }
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| {
                env.render(black_box(&mut buffer), black_box(&controls));
            })
        });
    }

    group.finish();
}
