//! FFT ocean wave simulation.
//!
//! Synthesizes a time-evolving displacement field from a directional wave spectrum split over
//! up to four cascades, transforms it with a Stockham FFT in wgpu compute shaders, and derives
//! a decaying foam field and CPU-side collision heights from the result.

pub mod error;
pub mod gpu;
pub mod logging;
pub mod ocean;

pub use error::{ConfigError, Error, Result};
