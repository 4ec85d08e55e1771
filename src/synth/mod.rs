// Purpose: per-voice sample playback built from the dsp primitives
// This layer reads ROM records and live settings; voice allocation and
// note mixing sit above it

pub mod cursor;
pub mod partial;

pub use partial::{Partial, PartialError};

/// Result of rendering one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    /// Nothing more will be produced; the owner can drop the partial.
    Finished,
}
