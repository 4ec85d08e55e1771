//! Benchmarks for partial playback.

use std::f32::consts::TAU;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use rompler_dsp::dsp::envelope::EnvelopeDef;
use rompler_dsp::rom::{
    ControlRom, InstPartial, Instrument, LoopMode, PartialDef, PcmRom, SampleInfo,
    SynthGeneration,
};
use rompler_dsp::{Partial, Settings};

use crate::BLOCK_SIZES;

const SAMPLE_LEN: u32 = 4_096;

fn rom(loop_mode: LoopMode) -> (ControlRom, PcmRom) {
    let partial = InstPartial {
        partial_index: 0,
        coarse_pitch: 0x40,
        fine_pitch: 0x40,
        pitch_key_flw: 0x4a,
        volume: 110,
        panpot: 0x30,
        pitch_env: EnvelopeDef::linear([20.0, 0.0, 0.0, 0.0, 0.0], [30, 30, 30, 0, 30]),
        pitch_env_init: -50.0,
        filter_env: EnvelopeDef::default(),
        filter_env_init: 0.0,
        amp_env: EnvelopeDef::linear([1.0, 1.0, 0.8, 0.8, 0.0], [20, 10, 60, 0, 60]),
    };
    let control = ControlRom {
        generation: SynthGeneration::Sc55mk2,
        instruments: vec![Instrument {
            name: "Bench".into(),
            partials: vec![partial],
        }],
        partials: vec![PartialDef::single(0)],
        samples: vec![SampleInfo {
            volume: 120,
            fine_volume: 1024,
            pitch: 1024,
            root_key: 60,
            loop_mode,
            loop_len: 1_024,
            sample_len: SAMPLE_LEN,
        }],
    };
    let pcm = (0..SAMPLE_LEN)
        .map(|i| (TAU * i as f32 / 64.0).sin())
        .collect();

    (control, PcmRom::new(vec![pcm]))
}

pub fn bench_partials(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/partials");
    let settings = Settings::default();

    for (name, loop_mode) in [
        ("forward", LoopMode::Forward),
        ("forward_backward", LoopMode::ForwardBackward),
    ] {
        let (control, pcm) = rom(loop_mode);

        for &size in BLOCK_SIZES {
            let mut frames = vec![[0.0f32; 2]; size];

            // === SINGLE PARTIAL ===
            let mut single = Partial::new(64, 0, 0, &control, &pcm, &settings, 0)
                .expect("bench ROM is complete");
            group.bench_with_input(
                BenchmarkId::new(format!("{}/single", name), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        single.render(black_box(&settings), black_box(&mut frames));
                    })
                },
            );

            // === CHORD ===
            // 16 partials spread over three octaves, summed into one buffer
            let mut chord: Vec<Partial> = (0..16u8)
                .map(|i| {
                    Partial::new(40 + i * 2, 0, 0, &control, &pcm, &settings, 0)
                        .expect("bench ROM is complete")
                })
                .collect();
            group.bench_with_input(
                BenchmarkId::new(format!("{}/chord16", name), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        frames.fill([0.0; 2]);
                        for partial in chord.iter_mut() {
                            partial.render(black_box(&settings), black_box(&mut frames));
                        }
                    })
                },
            );
        }
    }

    group.finish();
}
