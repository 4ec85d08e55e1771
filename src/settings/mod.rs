//! Live parameter store consumed by the partial engine.
//!
//! The engine never owns settings. It reads them through [`ParamStore`] on
//! every sample, so controllers moved by the player take effect immediately.
//! [`Settings`] is a plain in-memory implementation with hardware power-on
//! defaults; hosts with their own storage implement the trait instead.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of parts (MIDI channels).
pub const PART_COUNT: usize = 16;
/// Number of drum maps.
pub const DRUM_MAP_COUNT: usize = 2;
/// Part used for rhythm at power-on (MIDI channel 10).
pub const DEFAULT_RHYTHM_PART: usize = 9;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Storage width of a parameter.
///
/// Nibble forms spread one value over several 4-bit SysEx bytes; the value
/// handed out is the reassembled integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamWidth {
    Bits7,
    Bits14,
    Nib16,
    Nib32,
}

impl ParamWidth {
    pub const fn max(self) -> u16 {
        match self {
            ParamWidth::Bits7 => 0x7f,
            ParamWidth::Bits14 => 0x3fff,
            ParamWidth::Nib16 => 0xff,
            ParamWidth::Nib32 => 0xffff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemParam {
    /// Master key shift in semitones.
    KeyShift,
    /// Master tune in 0.1 cent steps.
    Tune,
}

impl SystemParam {
    pub const fn width(self) -> ParamWidth {
        match self {
            SystemParam::KeyShift => ParamWidth::Bits7,
            SystemParam::Tune => ParamWidth::Nib32,
        }
    }

    pub const fn center(self) -> u16 {
        match self {
            SystemParam::KeyShift => 0x40,
            SystemParam::Tune => 0x400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchParam {
    /// 0 = normal part, n = drum map n - 1.
    UseForRhythm,
    /// RPN coarse tuning, semitones.
    PitchCoarseTune,
    /// Part key shift, semitones.
    PitchKeyShift,
    /// Fixed frequency offset, 0.1 Hz steps.
    PitchOffsetFine,
    /// RPN fine tuning, 8192 steps per 100 cents.
    PitchFineTune,
    /// Scale tuning for one semitone of the octave (0 = C), in cents.
    ScaleTuning(u8),
    EnvAttack,
    EnvDecay,
    EnvRelease,
    /// Realtime amplitude control, 64 = unity.
    AmplitudeControl,
}

impl PatchParam {
    pub const fn width(self) -> ParamWidth {
        match self {
            PatchParam::PitchOffsetFine => ParamWidth::Nib16,
            PatchParam::PitchFineTune => ParamWidth::Bits14,
            _ => ParamWidth::Bits7,
        }
    }

    pub const fn center(self) -> u16 {
        match self {
            PatchParam::UseForRhythm => 0,
            PatchParam::PitchOffsetFine => 0x80,
            PatchParam::PitchFineTune => 8192,
            _ => 0x40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumParam {
    /// Key actually sounded for this drum, 0x3c = root.
    PlayKeyNumber,
    Level,
    Panpot,
    /// Non-zero if the drum stops on note-off.
    RxNoteOff,
}

/// Read access to the live parameter set.
pub trait ParamStore {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    fn system_param(&self, param: SystemParam) -> u16;

    fn patch_param(&self, param: PatchParam, part: u8) -> u16;

    fn drum_param(&self, param: DrumParam, map: u8, key: u8) -> u8;

    /// Current pitch bend of a part as a frequency ratio.
    fn pitch_bend_factor(&self, part: u8) -> f64;

    /// Patch parameter narrowed to its 7-bit form.
    fn patch_param_7bit(&self, param: PatchParam, part: u8) -> u8 {
        self.patch_param(param, part).min(0x7f) as u8
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PartSettings {
    pub use_for_rhythm: u8,
    pub pitch_coarse_tune: u8,
    pub pitch_key_shift: u8,
    pub pitch_offset_fine: u16,
    pub pitch_fine_tune: u16,
    pub scale_tuning: [u8; 12],
    pub env_attack: u8,
    pub env_decay: u8,
    pub env_release: u8,
    pub amplitude_control: u8,
    pub pitch_bend_factor: f64,
}

impl Default for PartSettings {
    fn default() -> Self {
        Self {
            use_for_rhythm: 0,
            pitch_coarse_tune: 0x40,
            pitch_key_shift: 0x40,
            pitch_offset_fine: 0x80,
            pitch_fine_tune: 8192,
            scale_tuning: [0x40; 12],
            env_attack: 0x40,
            env_decay: 0x40,
            env_release: 0x40,
            amplitude_control: 0x40,
            pitch_bend_factor: 1.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrumKeySettings {
    pub play_key_number: u8,
    pub level: u8,
    pub panpot: u8,
    pub rx_note_off: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DrumMap {
    pub keys: Vec<DrumKeySettings>,
}

impl Default for DrumMap {
    fn default() -> Self {
        // Most GS drum sets ignore note-off
        let keys = (0..128u8)
            .map(|_| DrumKeySettings {
                play_key_number: 0x3c,
                level: 0x7f,
                panpot: 0x40,
                rx_note_off: false,
            })
            .collect();

        Self { keys }
    }
}

/// In-memory parameter store.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sample_rate: u32,
    pub key_shift: u8,
    pub tune: u16,
    pub parts: Vec<PartSettings>,
    pub drum_maps: Vec<DrumMap>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut parts = vec![PartSettings::default(); PART_COUNT];
        parts[DEFAULT_RHYTHM_PART].use_for_rhythm = 1;

        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            key_shift: 0x40,
            tune: 0x400,
            parts,
            drum_maps: vec![DrumMap::default(); DRUM_MAP_COUNT],
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }

    pub fn set_system_param(&mut self, param: SystemParam, value: u16) {
        let value = value.min(param.width().max());
        match param {
            SystemParam::KeyShift => self.key_shift = value as u8,
            SystemParam::Tune => self.tune = value,
        }
    }

    /// Set a patch parameter, clamped to its width. Unknown parts are ignored.
    pub fn set_patch_param(&mut self, param: PatchParam, part: u8, value: u16) {
        let value = value.min(param.width().max());
        let Some(part) = self.parts.get_mut(usize::from(part)) else {
            return;
        };

        match param {
            PatchParam::UseForRhythm => part.use_for_rhythm = value as u8,
            PatchParam::PitchCoarseTune => part.pitch_coarse_tune = value as u8,
            PatchParam::PitchKeyShift => part.pitch_key_shift = value as u8,
            PatchParam::PitchOffsetFine => part.pitch_offset_fine = value,
            PatchParam::PitchFineTune => part.pitch_fine_tune = value,
            PatchParam::ScaleTuning(semitone) => {
                part.scale_tuning[usize::from(semitone % 12)] = value as u8
            }
            PatchParam::EnvAttack => part.env_attack = value as u8,
            PatchParam::EnvDecay => part.env_decay = value as u8,
            PatchParam::EnvRelease => part.env_release = value as u8,
            PatchParam::AmplitudeControl => part.amplitude_control = value as u8,
        }
    }

    pub fn set_drum_param(&mut self, param: DrumParam, map: u8, key: u8, value: u8) {
        let value = value.min(0x7f);
        let Some(drum) = self
            .drum_maps
            .get_mut(usize::from(map))
            .and_then(|m| m.keys.get_mut(usize::from(key)))
        else {
            return;
        };

        match param {
            DrumParam::PlayKeyNumber => drum.play_key_number = value,
            DrumParam::Level => drum.level = value,
            DrumParam::Panpot => drum.panpot = value,
            DrumParam::RxNoteOff => drum.rx_note_off = value != 0,
        }
    }

    pub fn set_pitch_bend_factor(&mut self, part: u8, factor: f64) {
        if let Some(part) = self.parts.get_mut(usize::from(part)) {
            part.pitch_bend_factor = factor;
        }
    }
}

impl ParamStore for Settings {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn system_param(&self, param: SystemParam) -> u16 {
        match param {
            SystemParam::KeyShift => u16::from(self.key_shift),
            SystemParam::Tune => self.tune,
        }
    }

    fn patch_param(&self, param: PatchParam, part: u8) -> u16 {
        let Some(part) = self.parts.get(usize::from(part)) else {
            return param.center();
        };

        match param {
            PatchParam::UseForRhythm => u16::from(part.use_for_rhythm),
            PatchParam::PitchCoarseTune => u16::from(part.pitch_coarse_tune),
            PatchParam::PitchKeyShift => u16::from(part.pitch_key_shift),
            PatchParam::PitchOffsetFine => part.pitch_offset_fine,
            PatchParam::PitchFineTune => part.pitch_fine_tune,
            PatchParam::ScaleTuning(semitone) => {
                u16::from(part.scale_tuning[usize::from(semitone % 12)])
            }
            PatchParam::EnvAttack => u16::from(part.env_attack),
            PatchParam::EnvDecay => u16::from(part.env_decay),
            PatchParam::EnvRelease => u16::from(part.env_release),
            PatchParam::AmplitudeControl => u16::from(part.amplitude_control),
        }
    }

    fn drum_param(&self, param: DrumParam, map: u8, key: u8) -> u8 {
        let Some(drum) = self
            .drum_maps
            .get(usize::from(map))
            .and_then(|m| m.keys.get(usize::from(key)))
        else {
            return match param {
                DrumParam::PlayKeyNumber => 0x3c,
                DrumParam::Level => 0x7f,
                DrumParam::Panpot => 0x40,
                DrumParam::RxNoteOff => 0,
            };
        };

        match param {
            DrumParam::PlayKeyNumber => drum.play_key_number,
            DrumParam::Level => drum.level,
            DrumParam::Panpot => drum.panpot,
            DrumParam::RxNoteOff => u8::from(drum.rx_note_off),
        }
    }

    fn pitch_bend_factor(&self, part: u8) -> f64 {
        self.parts
            .get(usize::from(part))
            .map_or(1.0, |p| p.pitch_bend_factor)
    }
}
