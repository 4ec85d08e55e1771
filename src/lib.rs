pub mod dsp;
pub mod rom; // Read-only instrument and sample records
pub mod settings; // Live parameter store
pub mod synth; // Per-voice partial playback

pub use settings::{ParamStore, Settings};
pub use synth::{Partial, PartialError, PlaybackState};
