//! Read-only instrument and sample records.
//!
//! Parsing ROM images is somebody else's job. These types are what a parser
//! hands over: plain records that are never mutated once loaded, so every
//! partial simply borrows them for as long as it plays.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::EnvelopeDef;

/// Native sample rate of all waveform data in the PCM ROM.
pub const ROM_SAMPLE_RATE: u32 = 32_000;

/// Break-point value that accepts any key.
pub const BREAK_ANY_KEY: u8 = 0x7f;

/// Sample index meaning "no sample assigned".
pub const UNSET_SAMPLE: u16 = 0xffff;

/// Number of entries in a partial's break-point table.
pub const BREAK_COUNT: usize = 16;

/// Hardware generation. Later models let part key shift reach drum parts.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SynthGeneration {
    Sc55,
    Sc55mk2,
    Sc88,
    Sc88Pro,
}

impl SynthGeneration {
    pub fn drum_key_shift(self) -> bool {
        self >= SynthGeneration::Sc55mk2
    }
}

/// What happens when playback reaches the end of a waveform.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Jump back to the loop start and keep going forward.
    Forward,
    /// Bounce between loop start and end.
    ForwardBackward,
    /// Play once and end the partial.
    ForwardStop,
}

impl LoopMode {
    /// Decode the raw mode byte stored with a sample.
    ///
    /// Entry point for ROM parsers building [`SampleInfo`] records.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(LoopMode::Forward),
            1 => Some(LoopMode::ForwardBackward),
            2 => Some(LoopMode::ForwardStop),
            _ => None,
        }
    }
}

/// Metadata for one recorded waveform.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SampleInfo {
    pub volume: u8,
    /// Centered at 1024.
    pub fine_volume: u16,
    /// Pitch correction, centered at 1024, 16 steps per cent.
    pub pitch: u16,
    pub root_key: u8,
    pub loop_mode: LoopMode,
    /// Frames in the loop, counted back from the end of the sample.
    pub loop_len: u32,
    pub sample_len: u32,
}

/// Break-point table selecting a sample by key.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDef {
    pub breaks: [u8; BREAK_COUNT],
    pub samples: [u16; BREAK_COUNT],
}

impl PartialDef {
    /// Single sample covering the whole keyboard.
    pub fn single(sample: u16) -> Self {
        let mut samples = [UNSET_SAMPLE; BREAK_COUNT];
        samples[0] = sample;

        Self {
            breaks: [BREAK_ANY_KEY; BREAK_COUNT],
            samples,
        }
    }

    /// Sample index for a (shifted) key.
    ///
    /// Picks the first break-point at or above the key; `BREAK_ANY_KEY`
    /// accepts anything. `None` if no break-point matches. The returned index
    /// may still be `UNSET_SAMPLE`, which the caller has to treat as fatal.
    pub fn sample_for_key(&self, key: i32) -> Option<u16> {
        self.breaks
            .iter()
            .zip(self.samples.iter())
            .find(|(&brk, _)| i32::from(brk) >= key || brk == BREAK_ANY_KEY)
            .map(|(_, &sample)| sample)
    }
}

/// One partial as referenced from an instrument.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct InstPartial {
    /// Index into `ControlRom::partials`.
    pub partial_index: u16,
    /// Semitones, centered at 0x40.
    pub coarse_pitch: u8,
    /// Cents, centered at 0x40.
    pub fine_pitch: u8,
    /// Pitch key follow, 0x4a = 1:1.
    pub pitch_key_flw: u8,
    pub volume: u8,
    pub panpot: u8,

    /// Pitch envelope in cents, starting from `pitch_env_init`.
    pub pitch_env: EnvelopeDef,
    pub pitch_env_init: f64,
    /// Filter envelope, starting from `filter_env_init`.
    pub filter_env: EnvelopeDef,
    pub filter_env_init: f64,
    /// Amplitude envelope, starting from silence.
    pub amp_env: EnvelopeDef,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub name: String,
    pub partials: Vec<InstPartial>,
}

/// Instrument, partial and sample definitions.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct ControlRom {
    pub generation: SynthGeneration,
    pub instruments: Vec<Instrument>,
    pub partials: Vec<PartialDef>,
    pub samples: Vec<SampleInfo>,
}

impl ControlRom {
    pub fn generation(&self) -> SynthGeneration {
        self.generation
    }

    pub fn instrument(&self, index: u16) -> Option<&Instrument> {
        self.instruments.get(usize::from(index))
    }

    pub fn partial(&self, index: u16) -> Option<&PartialDef> {
        self.partials.get(usize::from(index))
    }

    pub fn sample(&self, index: u16) -> Option<&SampleInfo> {
        self.samples.get(usize::from(index))
    }
}

/// Decoded waveform data, one buffer per sample index.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct PcmRom {
    pub samples: Vec<Vec<f32>>,
}

impl PcmRom {
    pub fn new(samples: Vec<Vec<f32>>) -> Self {
        Self { samples }
    }

    pub fn samples(&self, index: u16) -> Option<&[f32]> {
        self.samples.get(usize::from(index)).map(Vec::as_slice)
    }
}
