use std::f64::consts::LN_2;
use std::fmt;

use tracing::{debug, error};

use crate::{
    dsp::{
        amplify::{pan_gains, panpot_position, volume_curve},
        envelope::{Envelope, EnvelopeControls},
    },
    rom::{ControlRom, InstPartial, PcmRom, SampleInfo, ROM_SAMPLE_RATE, UNSET_SAMPLE},
    settings::{DrumParam, ParamStore, PatchParam, SystemParam},
    synth::{cursor::WaveCursor, PlaybackState},
};

/*
Partial Engine
==============

A partial is one waveform played back for one note: a sample from ROM, read
at a pitch-dependent rate, smoothed, shaped by an amplitude envelope and
panned. A note is the sum of one or two partials.

Construction does everything that cannot change while the note sounds:

  1. key shift       coarse tune, plus master and part key shift for normal
                     parts. Drum parts only get the part key shift, and only
                     on generations that support it.
  2. sample          break-point lookup with key + key shift.
  3. key difference  semitones between the played key and the sample's root.
                     Drums use the drum map's play key instead.
  4. key follow      how strongly the key difference bends pitch.
  5. static tune     partial coarse/fine pitch, key difference, the sample's
                     stored correction and a fixed hardware trim, all in
                     cents, times ROM rate / output rate.
  6. envelopes       pitch, filter and amplitude, started immediately.

Per sample:

    rate = master tune · scale tuning · RPN fine tune     (0.1 cent units)
         · fixed Hz offset ratio
         · pitch bend
         · static tune
         · pitch envelope                                  (cents)

    cursor.advance(rate)  → smoothed sample
    sample · level gains · amplitude envelope → pan → += out[L], out[R]

Level gains are the sample and partial levels (fixed), the drum level (drums
only) and the part's realtime amplitude control / 64.

The tone filter stage is bypassed. Its envelope runs so its value can be
inspected, but it never touches the signal.
*/

/// Fixed pitch trim in cents, measured against hardware recordings.
const HARDWARE_PITCH_TRIM_CENTS: i32 = -120;

/// Play key that sounds a drum sample at its recorded pitch.
const DRUM_ROOT_KEY: i32 = 0x3c;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialError {
    UnknownInstrument(u16),
    UnknownPartial { instrument: u16, partial: usize },
    UnknownPartialDefinition(u16),
    /// No break-point covers the shifted key
    NoBreakpoint { partial_index: u16, key: i32 },
    /// Break-point table resolved to the "unset" sample
    UnresolvedSample { partial_index: u16, key: i32 },
    UnknownSample(u16),
}

impl fmt::Display for PartialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialError::UnknownInstrument(index) => {
                write!(f, "instrument {} not in control ROM", index)
            }
            PartialError::UnknownPartial {
                instrument,
                partial,
            } => write!(f, "instrument {} has no partial {}", instrument, partial),
            PartialError::UnknownPartialDefinition(index) => {
                write!(f, "partial definition {} not in control ROM", index)
            }
            PartialError::NoBreakpoint { partial_index, key } => write!(
                f,
                "partial definition {} has no break-point for key {}",
                partial_index, key
            ),
            PartialError::UnresolvedSample { partial_index, key } => write!(
                f,
                "partial definition {} resolved key {} to an unset sample",
                partial_index, key
            ),
            PartialError::UnknownSample(index) => {
                write!(f, "sample {} missing from control or PCM ROM", index)
            }
        }
    }
}

impl std::error::Error for PartialError {}

/// Envelope time controls for a part.
fn envelope_controls<S: ParamStore + ?Sized>(settings: &S, part: u8) -> EnvelopeControls {
    EnvelopeControls {
        attack: settings.patch_param_7bit(PatchParam::EnvAttack, part),
        decay: settings.patch_param_7bit(PatchParam::EnvDecay, part),
        release: settings.patch_param_7bit(PatchParam::EnvRelease, part),
    }
}

#[inline]
fn cents_to_ratio(cents: f64) -> f64 {
    (cents * LN_2 / 1200.0).exp()
}

/// Pitch key follow multiplier; 0x4a is 1:1.
fn pitch_key_follow(raw: u8) -> f64 {
    let raw = f64::from(raw);
    if raw - 64.0 == 10.0 {
        1.0
    } else {
        1.0 + (raw - 74.0) / 10.0
    }
}

pub struct Partial<'rom> {
    key: u8,
    part: u8,
    key_freq: f64,
    drum_map: Option<u8>,

    inst_partial: &'rom InstPartial,
    sample_info: &'rom SampleInfo,
    cursor: WaveCursor<'rom>,

    static_pitch_tune: f64,
    static_volume: f64,

    pitch_env: Envelope,
    filter_env: Envelope,
    amp_env: Envelope,
}

impl<'rom> Partial<'rom> {
    /// Set up partial `partial_id` of an instrument for `key` on `part`.
    ///
    /// Fails if the ROM records needed to play the key cannot be resolved; the
    /// failure is also logged.
    pub fn new<S: ParamStore + ?Sized>(
        key: u8,
        partial_id: usize,
        instrument_index: u16,
        control_rom: &'rom ControlRom,
        pcm_rom: &'rom PcmRom,
        settings: &S,
        part: u8,
    ) -> Result<Self, PartialError> {
        Self::build(
            key,
            partial_id,
            instrument_index,
            control_rom,
            pcm_rom,
            settings,
            part,
        )
        .map_err(|err| {
            error!(key, part, instrument = instrument_index, %err, "cannot create partial");
            err
        })
    }

    fn build<S: ParamStore + ?Sized>(
        key: u8,
        partial_id: usize,
        instrument_index: u16,
        control_rom: &'rom ControlRom,
        pcm_rom: &'rom PcmRom,
        settings: &S,
        part: u8,
    ) -> Result<Self, PartialError> {
        let instrument = control_rom
            .instrument(instrument_index)
            .ok_or(PartialError::UnknownInstrument(instrument_index))?;
        let inst_partial =
            instrument
                .partials
                .get(partial_id)
                .ok_or(PartialError::UnknownPartial {
                    instrument: instrument_index,
                    partial: partial_id,
                })?;

        let rhythm = settings.patch_param_7bit(PatchParam::UseForRhythm, part);
        let drum_map = rhythm.checked_sub(1);

        // 1: Key shifts
        let centered = |value: u16| i32::from(value) - 0x40;
        let mut key_shift = centered(settings.patch_param(PatchParam::PitchCoarseTune, part));
        if drum_map.is_none() {
            key_shift += centered(settings.system_param(SystemParam::KeyShift))
                + centered(settings.patch_param(PatchParam::PitchKeyShift, part));
        } else if control_rom.generation().drum_key_shift() {
            key_shift += centered(settings.patch_param(PatchParam::PitchKeyShift, part));
        }

        // 2: Sample from the break-point table
        let partial_index = inst_partial.partial_index;
        let shifted_key = i32::from(key) + key_shift;
        let sample_index = control_rom
            .partial(partial_index)
            .ok_or(PartialError::UnknownPartialDefinition(partial_index))?
            .sample_for_key(shifted_key)
            .ok_or(PartialError::NoBreakpoint {
                partial_index,
                key: shifted_key,
            })?;
        if sample_index == UNSET_SAMPLE {
            return Err(PartialError::UnresolvedSample {
                partial_index,
                key: shifted_key,
            });
        }

        let sample_info = control_rom
            .sample(sample_index)
            .ok_or(PartialError::UnknownSample(sample_index))?;
        let pcm = pcm_rom
            .samples(sample_index)
            .ok_or(PartialError::UnknownSample(sample_index))?;

        // 3: Key difference to the recorded pitch
        let key_diff = match drum_map {
            Some(map) => {
                key_shift + i32::from(settings.drum_param(DrumParam::PlayKeyNumber, map, key))
                    - DRUM_ROOT_KEY
            }
            None => shifted_key - i32::from(sample_info.root_key),
        };

        // 4 + 5: Static pitch in cents
        let follow = pitch_key_follow(inst_partial.pitch_key_flw);
        let sample_cents = (i32::from(sample_info.pitch) - 1024) / 16;
        let cents = (f64::from(i32::from(inst_partial.coarse_pitch) - 0x40)
            + f64::from(key_diff) * follow)
            * 100.0
            + f64::from(i32::from(inst_partial.fine_pitch) - 0x40 + sample_cents)
            + f64::from(HARDWARE_PITCH_TRIM_CENTS);

        let sample_rate = settings.sample_rate().max(1);
        let static_pitch_tune =
            cents_to_ratio(cents) * f64::from(ROM_SAMPLE_RATE) / f64::from(sample_rate);

        let sample_level = f64::from(sample_info.volume)
            + (f64::from(sample_info.fine_volume) - 1024.0) / 1000.0;
        let static_volume = volume_curve(sample_level as u8) * volume_curve(inst_partial.volume);

        // 6: Envelopes
        let controls = envelope_controls(settings, part);
        let pitch = &inst_partial.pitch_env;
        let mut pitch_env = Envelope::with_initial_value(
            inst_partial.pitch_env_init,
            pitch.values,
            pitch.durations,
            sample_rate,
        )
        .named("pitch");
        let filter = &inst_partial.filter_env;
        let mut filter_env = Envelope::with_initial_value(
            inst_partial.filter_env_init,
            filter.values,
            filter.durations,
            sample_rate,
        )
        .named("filter");
        let mut amp_env = Envelope::new(&inst_partial.amp_env, key, sample_rate).named("amplitude");

        pitch_env.start(&controls);
        filter_env.start(&controls);
        amp_env.start(&controls);

        debug!(
            key,
            part,
            sample = sample_index,
            key_diff,
            static_pitch_tune,
            static_volume,
            drum = drum_map.is_some(),
            "partial created"
        );

        Ok(Self {
            key,
            part,
            key_freq: 440.0 * (LN_2 * (f64::from(key) - 69.0) / 12.0).exp(),
            drum_map,

            inst_partial,
            sample_info,
            cursor: WaveCursor::new(pcm, sample_info),

            static_pitch_tune,
            static_volume,

            pitch_env,
            filter_env,
            amp_env,
        })
    }

    /// Note-off. Drums that ignore note-off keep playing to the end.
    pub fn stop<S: ParamStore + ?Sized>(&mut self, settings: &S) {
        if let Some(map) = self.drum_map {
            if settings.drum_param(DrumParam::RxNoteOff, map, self.key) == 0 {
                debug!(key = self.key, map, "drum ignores note-off");
                return;
            }
        }

        let controls = envelope_controls(settings, self.part);
        self.pitch_env.release(&controls);
        self.filter_env.release(&controls);
        self.amp_env.release(&controls);
    }

    /// Playback rate in native frames per output sample.
    fn playback_rate<S: ParamStore + ?Sized>(
        &mut self,
        settings: &S,
        controls: &EnvelopeControls,
    ) -> f64 {
        let part = self.part;

        // Fixed offset is in 0.1 Hz steps, truncated to whole Hz
        let offset_fine = i32::from(settings.patch_param(PatchParam::PitchOffsetFine, part));
        let freq_key_tuned = self.key_freq + f64::from((offset_fine - 0x80) / 10);
        let offset_ratio = freq_key_tuned / self.key_freq;

        let tune = f64::from(settings.system_param(SystemParam::Tune)) - f64::from(0x400u16);
        let scale = f64::from(settings.patch_param_7bit(PatchParam::ScaleTuning(self.key % 12), part));
        let fine = f64::from(settings.patch_param(PatchParam::PitchFineTune, part));
        let pitch_exp = tune + (scale - 64.0) * 10.0 + (fine - 8192.0) / 8.192;

        (pitch_exp * LN_2 / 12000.0).exp()
            * offset_ratio
            * settings.pitch_bend_factor(part)
            * self.static_pitch_tune
            * cents_to_ratio(self.pitch_env.next_value(controls))
    }

    /// Render one sample and add it to `out` (left, right).
    ///
    /// Nothing is added on the call that reports `Finished`.
    pub fn next_sample<S: ParamStore + ?Sized>(
        &mut self,
        settings: &S,
        out: &mut [f32; 2],
    ) -> PlaybackState {
        if self.amp_env.is_finished() {
            return PlaybackState::Finished;
        }

        let controls = envelope_controls(settings, self.part);
        let rate = self.playback_rate(settings, &controls);

        // Tone filter is bypassed; keep its envelope in step
        self.filter_env.next_value(&controls);

        if self.cursor.advance(rate) == PlaybackState::Finished {
            return PlaybackState::Finished;
        }

        let mut gain = self.static_volume;
        if let Some(map) = self.drum_map {
            gain *= volume_curve(settings.drum_param(DrumParam::Level, map, self.key));
        }
        gain *= f64::from(settings.patch_param_7bit(PatchParam::AmplitudeControl, self.part)) / 64.0;

        let sample = self.cursor.sample() * gain * self.amp_env.next_value(&controls);

        let panpot = match self.drum_map {
            Some(map) => settings.drum_param(DrumParam::Panpot, map, self.key),
            None => self.inst_partial.panpot,
        };
        let (left, right) = pan_gains(panpot_position(panpot));

        out[0] += (sample * left) as f32;
        out[1] += (sample * right) as f32;

        PlaybackState::Playing
    }

    /// Render a block of stereo frames, adding into `out`.
    ///
    /// Stops at the first frame that reports `Finished`.
    pub fn render<S: ParamStore + ?Sized>(
        &mut self,
        settings: &S,
        out: &mut [[f32; 2]],
    ) -> PlaybackState {
        for frame in out.iter_mut() {
            if self.next_sample(settings, frame) == PlaybackState::Finished {
                return PlaybackState::Finished;
            }
        }
        PlaybackState::Playing
    }

    /// True once the amplitude envelope has completed its release.
    pub fn is_finished(&self) -> bool {
        self.amp_env.is_finished()
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn is_drum(&self) -> bool {
        self.drum_map.is_some()
    }

    /// Resampling ratio at neutral pitch.
    pub fn static_pitch_tune(&self) -> f64 {
        self.static_pitch_tune
    }

    pub fn sample_info(&self) -> &SampleInfo {
        self.sample_info
    }

    pub fn cursor(&self) -> &WaveCursor<'rom> {
        &self.cursor
    }

    pub fn pitch_envelope(&self) -> &Envelope {
        &self.pitch_env
    }

    pub fn filter_envelope(&self) -> &Envelope {
        &self.filter_env
    }

    pub fn amp_envelope(&self) -> &Envelope {
        &self.amp_env
    }
}
