//! Low-level DSP primitives used by the partial engine.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside partials. They stay focused on the signal-processing
//! math; ROM lookups and parameter reads happen one layer up in `synth`.

/// Volume curve and pan law.
pub mod amplify;
/// Attack/hold/decay/sustain/release envelope generator.
pub mod envelope;
/// Fixed low-pass stage used to smooth raw ROM samples.
pub mod filter;

pub use envelope::{EnvelopePhase, EnvelopeShape};
