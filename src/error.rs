//! Error types for the ocean simulation

use thiserror::Error;

/// Invalid settings or preset data, detected before any work is dispatched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
  #[error("unsupported resolution {0}, expected 64, 128, 256 or 512")]
  UnsupportedResolution(u32),

  #[error("FFT size {0} must be a power of two of at least 8")]
  InvalidFftSize(u32),

  #[error("cascade count {0} is outside 2..=4")]
  CascadeCount(u32),

  #[error("{requested} readback cascades requested, at most {limit} allowed")]
  ReadbackCascades { requested: u32, limit: u32 },

  #[error("{field} = {value} is out of range")]
  OutOfRange { field: &'static str, value: f32 },

  #[error("texture '{label}' is {found:?}, expected {expected:?}")]
  ExtentMismatch {
    label: String,
    expected: [u32; 3],
    found: [u32; 3],
  },

  #[error("no wave presets supplied")]
  NoPresets,

  #[error("preset '{name}': {source}")]
  Preset {
    name: String,
    #[source]
    source: Box<ConfigError>,
  },
}

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("image error: {0}")]
  Image(#[from] image::ImageError),

  #[error("no suitable GPU adapter")]
  NoAdapter,

  #[error("request device: {0}")]
  RequestDevice(#[from] wgpu::RequestDeviceError),

  #[error("readback failed: {0}")]
  Readback(#[from] wgpu::BufferAsyncError),
}

pub type Result<T> = std::result::Result<T, Error>;
