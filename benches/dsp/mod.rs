//! Benchmarks for low-level DSP primitives.

mod envelope;
mod filter;

pub use envelope::bench_envelope;
pub use filter::bench_filter;
