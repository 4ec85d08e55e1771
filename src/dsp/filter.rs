use std::f64::consts::{PI, SQRT_2};

/*
Sample Smoothing Filter
=======================

Raw ROM samples are fed through two identical low-pass stages before they are
used. The stages run at the ROM's native rate, not the output rate: one raw
sample in, one smoothed sample out, regardless of how fast the read cursor is
moving.

Each stage is a two-pole state-variable filter in the trapezoidal (TPT)
form, tapped at its low-pass output:

    g  = tan(π · cutoff / sample_rate)
    k  = damping (√2 gives a Butterworth response)
    h  = 1 / (1 + g·(g + k))

    v3 = x - ic2
    v1 = h · (ic1 + g·v3)        band-pass
    v2 = ic2 + g·v1              low-pass
    ic1 = 2·v1 - ic1
    ic2 = 2·v2 - ic2

Two stages in series give a four-pole roll-off. The parameters are fixed, so
coefficients are computed once when the stage is built and never again.

DC passes with unity gain, which keeps looped sustains at their stored level.
*/

/// Cutoff of the smoothing stages in Hz.
pub const SMOOTHING_CUTOFF_HZ: f64 = 15_000.0;

pub struct SmoothingFilter {
    ic1eq: f64, // First integrator's memory
    ic2eq: f64, // Second integrator's memory

    g: f64,
    k: f64,
    h: f64,
}

impl SmoothingFilter {
    pub fn new(sample_rate: f64, cutoff_hz: f64) -> Self {
        // Keep the prewarp below Nyquist
        let cutoff_hz = cutoff_hz.clamp(1.0, sample_rate * 0.49);
        let g = (PI * cutoff_hz / sample_rate).tan();
        let k = SQRT_2;

        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            g,
            k,
            h: 1.0 / (1.0 + g * (g + k)),
        }
    }

    /// Stage tuned for sample data at `native_rate`.
    pub fn for_native_rate(native_rate: u32) -> Self {
        Self::new(f64::from(native_rate), SMOOTHING_CUTOFF_HZ)
    }

    #[inline]
    pub fn apply(&mut self, sample: f64) -> f64 {
        let v3 = sample - self.ic2eq;
        let v1 = self.h * (self.ic1eq + self.g * v3);
        let v2 = self.ic2eq + self.g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        v2
    }

    pub fn render(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.apply(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}
