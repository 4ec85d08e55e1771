//! Synthetic ROM shared by the integration tests.

use std::f32::consts::TAU;

use rompler_dsp::dsp::envelope::EnvelopeDef;
use rompler_dsp::rom::{
    ControlRom, InstPartial, Instrument, LoopMode, PartialDef, PcmRom, SampleInfo,
    SynthGeneration,
};

/// Frames per sine period in the test waveform (500 Hz at the ROM rate).
pub const PERIOD: u32 = 64;
pub const SAMPLE_LEN: u32 = PERIOD * 40;
pub const LOOP_LEN: u32 = PERIOD * 20;
pub const ROOT_KEY: u8 = 60;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub fn sustained_partial(panpot: u8) -> InstPartial {
    InstPartial {
        partial_index: 0,
        coarse_pitch: 0x40,
        fine_pitch: 0x40,
        pitch_key_flw: 0x4a,
        volume: 127,
        panpot,
        pitch_env: EnvelopeDef::default(),
        pitch_env_init: 0.0,
        filter_env: EnvelopeDef::default(),
        filter_env_init: 0.0,
        amp_env: EnvelopeDef::linear([1.0, 1.0, 1.0, 1.0, 0.0], [0, 0, 0, 0, 20]),
    }
}

/// One instrument with one partial playing a looped sine.
pub fn sine_rom(loop_mode: LoopMode, partial: InstPartial) -> (ControlRom, PcmRom) {
    let control = ControlRom {
        generation: SynthGeneration::Sc55mk2,
        instruments: vec![Instrument {
            name: "Sine".into(),
            partials: vec![partial],
        }],
        partials: vec![PartialDef::single(0)],
        samples: vec![SampleInfo {
            volume: 127,
            fine_volume: 1024,
            pitch: 1024,
            root_key: ROOT_KEY,
            loop_mode,
            loop_len: LOOP_LEN,
            sample_len: SAMPLE_LEN,
        }],
    };
    let pcm = (0..SAMPLE_LEN)
        .map(|i| (TAU * i as f32 / PERIOD as f32).sin())
        .collect();

    (control, PcmRom::new(vec![pcm]))
}
