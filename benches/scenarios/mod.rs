//! Real-world scenario benchmarks.
//!
//! These model a busy part: many partials reading looped samples at
//! different pitches and summing into one stereo buffer.

mod partials;

pub use partials::bench_partials;
