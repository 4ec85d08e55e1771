#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

/*
AHDSR Envelope Implementation
=============================

This module implements the five-phase envelope generator used for pitch,
filter and amplitude control of every partial. The same generator serves all
three uses; only the interpretation of its output differs.

Vocabulary
----------

  phase       Which segment of the envelope we're in: Off, Attack, Hold,
              Decay, Sustain or Release. Phases only ever move forward, with
              one exception: release() may jump straight to Release.

  target      The value a phase ramps towards. Every phase has its own target,
              so "attack to 1.0, then hold at 1.0" is just two targets of 1.0.

  duration    A 7-bit (0-127) time code, not seconds. See "Time Codes" below.

  shape       Linear or logarithmic ramp. Stored per phase.

  entry value The envelope's value at the moment a phase started. Ramps go
              from the entry value to the target, never from a fixed level,
              so a release during attack starts where the attack left off.

  finished    Set once the Release ramp has run out. Never cleared.


The Shape
---------

    Value
      1.0 ┐    ___________
          │   ╱   hold    ╲__
          │  ╱               ╲____         (logarithmic decay)
      S   │ ╱                     ╲_________________
          │╱                                        ╲
      0.0 └──────────────────────────────────────────╲──→ Time
           Attack  Hold    Decay     Sustain          Release
            (A)    (H)      (D)        (S)              (R)

Sustain is not a ramp in time: once its timer has run out the value simply
stays put. A sustain target of exactly 0.0 is treated as "no sustain" and the
envelope rolls into Release by itself, which is how percussive sounds end
without a note-off.


Time Codes
----------

Durations are 7-bit codes that the hardware maps through a lookup table we do
not have. The curve below is an empirical fit of that table and must be kept
exactly as written:

    seconds = 2^(code / 18) / 5.45 - 0.183

When the envelope belongs to a key, higher keys run faster:

    seconds *= 1 - key / 128

Attack, Decay and Release codes are offset by the part's live envelope
controls (centered at 64) before the lookup, and the sum is clamped to 0-127.
Seconds become samples by rounding `seconds * sample_rate`; a phase of zero
samples jumps straight to its target.


Ramps
-----

With `progress = elapsed / length` (0.0 to 1.0):

    linear       value = entry + (target - entry) * progress
    logarithmic  value = entry + (target - entry) * ln(10·progress + 1) / ln(11)

The logarithmic ramp covers most of the distance early, which gives a concave
rise or a convex fall depending on the direction of travel.


Timing Contract
---------------

There is no clock. Exactly one call to `next_value` per output sample keeps
the envelope sample-accurate. The elapsed counter is bumped after the value
for the current sample has been computed, so the first sample of every phase
is its entry value.
*/

/// Number of ramping phases (everything except `Off`).
pub const PHASE_COUNT: usize = 5;

/// The current phase of the envelope state machine.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvelopePhase {
    Off,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
}

impl EnvelopePhase {
    /// Index into the per-phase tables. `Off` has no slot.
    #[inline]
    fn slot(self) -> Option<usize> {
        match self {
            EnvelopePhase::Off => None,
            phase => Some(phase as usize - 1),
        }
    }

    /// The phase that follows on natural expiry.
    fn next(self) -> EnvelopePhase {
        match self {
            EnvelopePhase::Off => EnvelopePhase::Off,
            EnvelopePhase::Attack => EnvelopePhase::Hold,
            EnvelopePhase::Hold => EnvelopePhase::Decay,
            EnvelopePhase::Decay => EnvelopePhase::Sustain,
            EnvelopePhase::Sustain | EnvelopePhase::Release => EnvelopePhase::Release,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeShape {
    #[default]
    Linear,
    Logarithmic,
}

/// Static description of an envelope as stored with a partial definition.
///
/// All tables are indexed Attack, Hold, Decay, Sustain, Release.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvelopeDef {
    pub values: [f64; PHASE_COUNT],
    pub durations: [u8; PHASE_COUNT],
    pub shapes: [EnvelopeShape; PHASE_COUNT],
}

impl EnvelopeDef {
    pub fn new(
        values: [f64; PHASE_COUNT],
        durations: [u8; PHASE_COUNT],
        shapes: [EnvelopeShape; PHASE_COUNT],
    ) -> Self {
        Self {
            values,
            durations,
            shapes,
        }
    }

    /// All phases ramp linearly.
    pub fn linear(values: [f64; PHASE_COUNT], durations: [u8; PHASE_COUNT]) -> Self {
        Self::new(values, durations, [EnvelopeShape::Linear; PHASE_COUNT])
    }
}

/// Live 7-bit controls that stretch or shrink Attack, Decay and Release.
///
/// 64 is neutral. These are read from the part settings by the owner of the
/// envelope and handed in on every call that may start a new phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeControls {
    pub attack: u8,
    pub decay: u8,
    pub release: u8,
}

impl Default for EnvelopeControls {
    fn default() -> Self {
        Self {
            attack: 0x40,
            decay: 0x40,
            release: 0x40,
        }
    }
}

impl EnvelopeControls {
    fn offset(&self, phase: EnvelopePhase) -> i32 {
        let control = match phase {
            EnvelopePhase::Attack => self.attack,
            EnvelopePhase::Decay => self.decay,
            EnvelopePhase::Release => self.release,
            _ => return 0,
        };
        i32::from(control) - 0x40
    }
}

/// Convert a 7-bit duration code to seconds.
///
/// Empirical fit of the hardware time table; `key` shortens envelopes that
/// belong to higher notes.
pub fn phase_seconds(duration: u8, key: Option<u8>) -> f64 {
    let seconds = 2.0_f64.powf(f64::from(duration) / 18.0) / 5.45 - 0.183;

    match key {
        Some(key) => seconds * (1.0 - f64::from(key) / 128.0),
        None => seconds,
    }
}

pub struct Envelope {
    // Static definition
    values: [f64; PHASE_COUNT],
    durations: [u8; PHASE_COUNT],
    shapes: [EnvelopeShape; PHASE_COUNT],
    key: Option<u8>,
    sample_rate: u32,
    name: &'static str,

    // Runtime state
    phase: EnvelopePhase,
    phase_elapsed: u32, // samples produced in the current phase
    phase_len: u32,     // computed length of the current phase in samples
    phase_entry: f64,   // value when the current phase began
    value: f64,
    finished: bool,
}

impl Envelope {
    /// Envelope tied to a key, starting from 0.0.
    pub fn new(def: &EnvelopeDef, key: u8, sample_rate: u32) -> Self {
        Self {
            values: def.values,
            durations: def.durations,
            shapes: def.shapes,
            key: Some(key),
            sample_rate,
            name: "envelope",

            phase: EnvelopePhase::Off,
            phase_elapsed: 0,
            phase_len: 0,
            phase_entry: 0.0,
            value: 0.0,
            finished: false,
        }
    }

    /// Key-independent envelope starting from `initial`.
    ///
    /// Used for modulation envelopes (pitch, filter) whose resting value is
    /// not zero. Shapes are forced to linear.
    pub fn with_initial_value(
        initial: f64,
        values: [f64; PHASE_COUNT],
        durations: [u8; PHASE_COUNT],
        sample_rate: u32,
    ) -> Self {
        Self {
            values,
            durations,
            shapes: [EnvelopeShape::Linear; PHASE_COUNT],
            key: None,
            sample_rate,
            name: "envelope",

            phase: EnvelopePhase::Off,
            phase_elapsed: 0,
            phase_len: 0,
            phase_entry: initial,
            value: initial,
            finished: false,
        }
    }

    /// Label used in diagnostics.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Leave `Off` and begin the attack ramp.
    ///
    /// Only valid once, from `Off`. Any later call is reported and ignored.
    pub fn start(&mut self, controls: &EnvelopeControls) {
        if self.phase != EnvelopePhase::Off {
            error!(envelope = self.name, phase = ?self.phase, "envelope started twice");
            return;
        }

        self.enter_phase(EnvelopePhase::Attack, controls);
    }

    /// Jump to Release from wherever we are. No-op if already releasing.
    pub fn release(&mut self, controls: &EnvelopeControls) {
        if self.phase == EnvelopePhase::Release {
            return;
        }

        self.enter_phase(EnvelopePhase::Release, controls);
    }

    fn enter_phase(&mut self, phase: EnvelopePhase, controls: &EnvelopeControls) {
        let Some(slot) = phase.slot() else {
            error!(envelope = self.name, "envelope asked to enter the Off phase");
            return;
        };

        self.phase_entry = self.value;

        let duration = (i32::from(self.durations[slot]) + controls.offset(phase)).clamp(0, 127);
        let seconds = phase_seconds(duration as u8, self.key);
        self.phase_len = (seconds * f64::from(self.sample_rate)).round().max(0.0) as u32;

        self.phase_elapsed = 0;
        self.phase = phase;

        trace!(
            envelope = self.name,
            ?phase,
            seconds,
            samples = self.phase_len,
            from = self.phase_entry,
            to = self.values[slot],
            "envelope phase"
        );
    }

    /// Advance the envelope by one sample and return its value.
    ///
    /// Sampling an envelope that was never started is a caller bug; it is
    /// reported and yields 0.0 without touching any state.
    pub fn next_value(&mut self, controls: &EnvelopeControls) -> f64 {
        if self.phase == EnvelopePhase::Off {
            error!(envelope = self.name, "envelope sampled while Off");
            return 0.0;
        }

        if self.phase_elapsed > self.phase_len {
            match self.phase {
                EnvelopePhase::Sustain if self.values[EnvelopePhase::Sustain as usize - 1] != 0.0 => {
                    // Sustain is not time-bounded
                    return self.value;
                }
                EnvelopePhase::Release => {
                    self.finished = true;
                    self.value = 0.0;
                    return 0.0;
                }
                phase => self.enter_phase(phase.next(), controls),
            }
        }

        let Some(slot) = self.phase.slot() else {
            return 0.0;
        };
        let target = self.values[slot];

        self.value = if self.phase_len == 0 {
            target
        } else {
            let progress = f64::from(self.phase_elapsed) / f64::from(self.phase_len);
            let progress = match self.shapes[slot] {
                EnvelopeShape::Linear => progress,
                EnvelopeShape::Logarithmic => (10.0 * progress + 1.0).ln() / 11.0_f64.ln(),
            };
            self.phase_entry + (target - self.phase_entry) * progress
        };

        self.phase_elapsed = self.phase_elapsed.saturating_add(1);

        self.value
    }

    /// Render a block of envelope values into the buffer.
    pub fn render(&mut self, buffer: &mut [f64], controls: &EnvelopeControls) {
        for sample in buffer.iter_mut() {
            *sample = self.next_value(controls);
        }
    }

    /// True once the Release ramp has completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// Most recent output value.
    pub fn value(&self) -> f64 {
        if self.finished {
            0.0
        } else {
            self.value
        }
    }

    /// Length in samples of the phase currently running.
    pub fn phase_len(&self) -> u32 {
        self.phase_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low enough that zero-code phases come out at zero samples.
    const SAMPLE_RATE: u32 = 1_000;

    fn scenario_def() -> EnvelopeDef {
        EnvelopeDef::new(
            [1.0, 1.0, 0.7, 0.3, 0.0],
            [10, 0, 20, 0, 15],
            [
                EnvelopeShape::Linear,
                EnvelopeShape::Linear,
                EnvelopeShape::Logarithmic,
                EnvelopeShape::Linear,
                EnvelopeShape::Linear,
            ],
        )
    }

    fn render_samples(env: &mut Envelope, samples: usize) -> Vec<f64> {
        let controls = EnvelopeControls::default();
        (0..samples).map(|_| env.next_value(&controls)).collect()
    }

    #[test]
    fn seconds_grow_with_duration_code() {
        for key in [None, Some(0), Some(60), Some(127)] {
            for code in 0..127u8 {
                assert!(
                    phase_seconds(code + 1, key) >= phase_seconds(code, key),
                    "code {} key {:?}",
                    code,
                    key
                );
            }
        }
    }

    #[test]
    fn seconds_shrink_with_key() {
        for code in [0u8, 10, 64, 127] {
            for key in 0..127u8 {
                assert!(phase_seconds(code, Some(key + 1)) <= phase_seconds(code, Some(key)));
            }
        }
    }

    #[test]
    fn seconds_match_time_curve() {
        let expected = 2.0_f64.powf(64.0 / 18.0) / 5.45 - 0.183;
        assert_eq!(phase_seconds(64, None), expected);
        assert_eq!(phase_seconds(64, Some(64)), expected * 0.5);
    }

    #[test]
    fn off_envelope_reports_zero_and_stays_off() {
        let mut env = Envelope::new(&scenario_def(), 60, SAMPLE_RATE);
        let controls = EnvelopeControls::default();

        assert_eq!(env.next_value(&controls), 0.0);
        assert_eq!(env.phase(), EnvelopePhase::Off);
        assert!(!env.is_finished());
    }

    #[test]
    fn first_sample_of_phase_is_entry_value() {
        let mut env = Envelope::with_initial_value(
            0.25,
            [1.0, 1.0, 0.5, 0.5, 0.0],
            [40, 40, 40, 40, 40],
            SAMPLE_RATE,
        );
        let controls = EnvelopeControls::default();
        env.start(&controls);

        assert_eq!(env.next_value(&controls), 0.25);
    }

    #[test]
    fn ahdsr_scenario() {
        let mut env = Envelope::new(&scenario_def(), 60, SAMPLE_RATE);
        let controls = EnvelopeControls::default();
        env.start(&controls);

        // Attack: monotonic rise ending exactly on the target
        let attack_len = env.phase_len() as usize;
        assert!(attack_len > 0);
        let attack = render_samples(&mut env, attack_len + 1);
        assert_eq!(attack[0], 0.0);
        assert!(attack.windows(2).all(|w| w[1] >= w[0]));
        assert!((attack[attack_len] - 1.0).abs() < 1e-12);
        assert_eq!(env.phase(), EnvelopePhase::Attack);

        // Hold has zero length and is skipped in a single sample
        let hold = render_samples(&mut env, 1);
        assert_eq!(env.phase(), EnvelopePhase::Hold);
        assert_eq!(env.phase_len(), 0);
        assert_eq!(hold[0], 1.0);

        // Decay: logarithmic fall toward 0.7, below the straight line
        let decay_first = render_samples(&mut env, 1)[0];
        assert_eq!(env.phase(), EnvelopePhase::Decay);
        assert_eq!(decay_first, 1.0);
        let decay_len = env.phase_len() as usize;
        let decay = render_samples(&mut env, decay_len);
        assert!(decay.windows(2).all(|w| w[1] <= w[0]));
        let mid = decay[decay_len / 2 - 1];
        assert!(mid < 0.85, "log decay should lead the linear ramp, got {}", mid);
        assert!((decay[decay_len - 1] - 0.7).abs() < 1e-12);

        // Sustain: constant 0.3 no matter how long we wait
        let sustain = render_samples(&mut env, 5_000);
        assert_eq!(env.phase(), EnvelopePhase::Sustain);
        assert!(sustain.iter().all(|&v| v == 0.3));

        // Release: ramps from 0.3 down to 0, then finishes
        env.release(&controls);
        assert_eq!(env.phase(), EnvelopePhase::Release);
        let release_len = env.phase_len() as usize;
        let release = render_samples(&mut env, release_len + 1);
        assert_eq!(release[0], 0.3);
        assert!(release.windows(2).all(|w| w[1] <= w[0]));
        assert!(!env.is_finished());

        assert_eq!(render_samples(&mut env, 1)[0], 0.0);
        assert!(env.is_finished());
        assert_eq!(env.value(), 0.0);
    }

    #[test]
    fn zero_sustain_rolls_into_release() {
        let def = EnvelopeDef::linear([1.0, 1.0, 0.5, 0.0, 0.0], [0, 0, 0, 0, 0]);
        let mut env = Envelope::new(&def, 60, SAMPLE_RATE);
        env.start(&EnvelopeControls::default());

        render_samples(&mut env, 8);

        assert_eq!(env.phase(), EnvelopePhase::Release);
        assert!(env.is_finished());
    }

    #[test]
    fn finished_never_reverts() {
        let def = EnvelopeDef::linear([1.0, 1.0, 0.5, 0.0, 0.0], [0, 0, 0, 0, 0]);
        let mut env = Envelope::new(&def, 60, SAMPLE_RATE);
        let controls = EnvelopeControls::default();
        env.start(&controls);

        let mut seen_finished = false;
        for _ in 0..100 {
            let value = env.next_value(&controls);
            if seen_finished {
                assert!(env.is_finished());
                assert_eq!(value, 0.0);
            }
            seen_finished |= env.is_finished();
            env.release(&controls);
        }
        assert!(seen_finished);
    }

    #[test]
    fn restart_after_finish_stays_silent() {
        let def = EnvelopeDef::linear([1.0, 1.0, 0.5, 0.0, 0.0], [0, 0, 0, 0, 0]);
        let mut env = Envelope::new(&def, 60, SAMPLE_RATE);
        let controls = EnvelopeControls::default();
        env.start(&controls);
        render_samples(&mut env, 10);
        assert!(env.is_finished());

        env.start(&controls);
        assert_eq!(env.phase(), EnvelopePhase::Release);
        assert!(render_samples(&mut env, 10).iter().all(|&v| v == 0.0));
        assert!(env.is_finished());
    }

    #[test]
    fn restart_during_sustain_is_ignored() {
        let def = EnvelopeDef::linear([1.0, 1.0, 0.5, 0.5, 0.0], [0, 0, 0, 0, 0]);
        let mut env = Envelope::new(&def, 60, SAMPLE_RATE);
        let controls = EnvelopeControls::default();
        env.start(&controls);
        render_samples(&mut env, 10);
        assert_eq!(env.phase(), EnvelopePhase::Sustain);

        env.start(&controls);
        assert_eq!(env.phase(), EnvelopePhase::Sustain);
        assert!(render_samples(&mut env, 10).iter().all(|&v| v == 0.5));
    }

    #[test]
    fn release_from_attack_starts_at_current_value() {
        let def = EnvelopeDef::linear([1.0, 1.0, 0.5, 0.5, 0.0], [60, 0, 60, 0, 60]);
        let mut env = Envelope::new(&def, 0, SAMPLE_RATE);
        let controls = EnvelopeControls::default();
        env.start(&controls);

        let last = *render_samples(&mut env, 50).last().unwrap();
        assert!(last > 0.0 && last < 1.0);

        env.release(&controls);
        assert_eq!(render_samples(&mut env, 1)[0], last);
    }

    #[test]
    fn controls_stretch_and_clamp_durations() {
        let def = EnvelopeDef::linear([1.0, 1.0, 0.5, 0.5, 0.0], [100, 100, 100, 100, 100]);

        let mut neutral = Envelope::new(&def, 60, SAMPLE_RATE);
        neutral.start(&EnvelopeControls::default());

        let mut slow = Envelope::new(&def, 60, SAMPLE_RATE);
        slow.start(&EnvelopeControls {
            attack: 127,
            ..Default::default()
        });

        let expected = (phase_seconds(127, Some(60)) * f64::from(SAMPLE_RATE)).round() as u32;
        assert_eq!(slow.phase_len(), expected);
        assert!(slow.phase_len() > neutral.phase_len());

        let mut fast = Envelope::new(&def, 60, SAMPLE_RATE);
        fast.start(&EnvelopeControls {
            attack: 0,
            ..Default::default()
        });
        assert!(fast.phase_len() < neutral.phase_len());
    }

    #[test]
    fn hold_ignores_controls() {
        let def = EnvelopeDef::linear([1.0, 1.0, 0.5, 0.5, 0.0], [0, 50, 0, 0, 0]);
        let controls = EnvelopeControls {
            attack: 0,
            decay: 0,
            release: 0,
        };
        let mut env = Envelope::new(&def, 0, SAMPLE_RATE);
        env.start(&controls);
        render_samples(&mut env, 2);

        assert_eq!(env.phase(), EnvelopePhase::Hold);
        let expected = (phase_seconds(50, Some(0)) * f64::from(SAMPLE_RATE)).round() as u32;
        assert_eq!(env.phase_len(), expected);
    }
}
