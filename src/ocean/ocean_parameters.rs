use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ocean::utils::lerp;

pub const GRAVITY: f32 = 9.81;
pub const MIN_FFT_SIZE: u32 = 8;
pub const SUPPORTED_RESOLUTIONS: [u32; 4] = [64, 128, 256, 512];
pub const MAX_CASCADES: usize = 4;
pub const MIN_CASCADES: u32 = 2;
pub const MAX_READBACK_CASCADES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnergySpectrumModel {
  PiersonMoskowitz,
  #[default]
  Jonswap,
  Tma,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumParams {
  pub model: EnergySpectrumModel,
  /// m/s at 10 m above the surface.
  pub wind_speed: f32,
  /// Degrees, 0 = +x.
  pub wind_direction: f32,
  /// Metres.
  pub fetch: f32,
  /// JONSWAP peak enhancement (gamma).
  pub peaking: f32,
  pub scale: f32,
  /// Waves shorter than this are removed. 0 disables the cutoff.
  pub cutoff_wavelength: f32,
  pub alignment: f32,
  pub extra_alignment: f32,
}

impl Default for SpectrumParams {
  fn default() -> SpectrumParams {
    SpectrumParams {
      model: EnergySpectrumModel::Jonswap,
      wind_speed: 5.0,
      wind_direction: 0.0,
      fetch: 100000.0,
      peaking: 3.3,
      scale: 1.0,
      cutoff_wavelength: 0.0,
      alignment: 0.5,
      extra_alignment: 0.0,
    }
  }
}

impl SpectrumParams {
  pub fn validate(&self) -> Result<(), ConfigError> {
    check_min("wind_speed", self.wind_speed, 0.0)?;
    check_min("fetch", self.fetch, f32::MIN_POSITIVE)?;
    check_min("peaking", self.peaking, f32::MIN_POSITIVE)?;
    check_unit("scale", self.scale)?;
    check_min("cutoff_wavelength", self.cutoff_wavelength, 0.0)?;
    check_unit("alignment", self.alignment)?;
    check_unit("extra_alignment", self.extra_alignment)
  }

  /// Every field interpolates linearly except `model`, which switches at `t = 0.5`.
  pub fn lerp(&self, other: &SpectrumParams, t: f32) -> SpectrumParams {
    SpectrumParams {
      model: if t < 0.5 { self.model } else { other.model },
      wind_speed: lerp(self.wind_speed, other.wind_speed, t),
      wind_direction: lerp(self.wind_direction, other.wind_direction, t),
      fetch: lerp(self.fetch, other.fetch, t),
      peaking: lerp(self.peaking, other.peaking, t),
      scale: lerp(self.scale, other.scale, t),
      cutoff_wavelength: lerp(self.cutoff_wavelength, other.cutoff_wavelength, t),
      alignment: lerp(self.alignment, other.alignment, t),
      extra_alignment: lerp(self.extra_alignment, other.extra_alignment, t),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoamParams {
  pub coverage: f32,
  pub density: f32,
  pub sharpness: f32,
  pub persistence: f32,
  pub trail_strength: f32,
  pub trail_size: f32,
  /// Degrees.
  pub trail_direction: f32,
  pub underwater_strength: f32,
  pub decay_rate: f32,
  pub cascade_weights: [f32; MAX_CASCADES],
}

impl Default for FoamParams {
  fn default() -> FoamParams {
    FoamParams {
      coverage: 0.5,
      density: 1.0,
      sharpness: 4.0,
      persistence: 0.5,
      trail_strength: 0.5,
      trail_size: 1.0,
      trail_direction: 0.0,
      underwater_strength: 0.3,
      decay_rate: 1.0,
      cascade_weights: [1.0, 1.0, 0.5, 0.25],
    }
  }
}

impl FoamParams {
  pub fn validate(&self) -> Result<(), ConfigError> {
    check_unit("coverage", self.coverage)?;
    check_min("density", self.density, 0.0)?;
    check_min("sharpness", self.sharpness, f32::MIN_POSITIVE)?;
    check_unit("persistence", self.persistence)?;
    check_min("trail_strength", self.trail_strength, 0.0)?;
    check_min("trail_size", self.trail_size, f32::MIN_POSITIVE)?;
    check_min("underwater_strength", self.underwater_strength, 0.0)?;
    check_min("decay_rate", self.decay_rate, 0.0)?;
    for weight in self.cascade_weights {
      check_min("cascade_weights", weight, 0.0)?;
    }
    Ok(())
  }

  pub fn lerp(&self, other: &FoamParams, t: f32) -> FoamParams {
    let mut cascade_weights = [0.0; MAX_CASCADES];
    for (i, weight) in cascade_weights.iter_mut().enumerate() {
      *weight = lerp(self.cascade_weights[i], other.cascade_weights[i], t);
    }

    FoamParams {
      coverage: lerp(self.coverage, other.coverage, t),
      density: lerp(self.density, other.density, t),
      sharpness: lerp(self.sharpness, other.sharpness, t),
      persistence: lerp(self.persistence, other.persistence, t),
      trail_strength: lerp(self.trail_strength, other.trail_strength, t),
      trail_size: lerp(self.trail_size, other.trail_size, t),
      trail_direction: lerp(self.trail_direction, other.trail_direction, t),
      underwater_strength: lerp(self.underwater_strength, other.underwater_strength, t),
      decay_rate: lerp(self.decay_rate, other.decay_rate, t),
      cascade_weights,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LengthScaleMode {
  /// Length scales follow a fixed geometric chain from `simulation_scale`.
  #[default]
  Auto,
  /// Length scales come from `length_scales` as given.
  Manual,
}

/// Which clock drives the foam trail blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FoamTrailClock {
  /// Real elapsed time; keeps blending while the simulation is paused.
  #[default]
  WallClock,
  SimulationTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
  pub resolution: u32,
  pub cascade_count: u32,
  pub length_scale_mode: LengthScaleMode,
  pub simulation_scale: f32,
  pub length_scales: [f32; MAX_CASCADES],
  pub allow_overlap: bool,
  pub min_waves_per_cascade: f32,
  pub anisotropic_level: u32,
  pub foam_enabled: bool,
  pub recompute_spectrum_every_frame: bool,
  pub readback_cascades: u32,
  pub collision_iterations: u32,
  pub depth: f32,
  pub gravity: f32,
  pub seed: u64,
  pub foam_trail_update_time: f32,
  pub foam_trail_clock: FoamTrailClock,
}

impl Default for SimulationSettings {
  fn default() -> SimulationSettings {
    SimulationSettings {
      resolution: 256,
      cascade_count: 3,
      length_scale_mode: LengthScaleMode::Auto,
      simulation_scale: 1.0,
      length_scales: [1024.0, 256.0, 64.0, 16.0],
      allow_overlap: false,
      min_waves_per_cascade: 2.0,
      anisotropic_level: 8,
      foam_enabled: true,
      recompute_spectrum_every_frame: false,
      readback_cascades: 1,
      collision_iterations: 3,
      depth: 500.0,
      gravity: GRAVITY,
      seed: 0,
      foam_trail_update_time: 5.0,
      foam_trail_clock: FoamTrailClock::WallClock,
    }
  }
}

impl SimulationSettings {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !SUPPORTED_RESOLUTIONS.contains(&self.resolution) {
      return Err(ConfigError::UnsupportedResolution(self.resolution));
    }
    if !(MIN_CASCADES..=MAX_CASCADES as u32).contains(&self.cascade_count) {
      return Err(ConfigError::CascadeCount(self.cascade_count));
    }
    let readback_limit = MAX_READBACK_CASCADES.min(self.cascade_count);
    if self.readback_cascades > readback_limit {
      return Err(ConfigError::ReadbackCascades {
        requested: self.readback_cascades,
        limit: readback_limit,
      });
    }
    if self.collision_iterations == 0 {
      return Err(ConfigError::OutOfRange {
        field: "collision_iterations",
        value: 0.0,
      });
    }
    if !(1..=16).contains(&self.anisotropic_level) {
      return Err(ConfigError::OutOfRange {
        field: "anisotropic_level",
        value: self.anisotropic_level as f32,
      });
    }
    match self.length_scale_mode {
      LengthScaleMode::Auto => check_min("simulation_scale", self.simulation_scale, f32::MIN_POSITIVE)?,
      LengthScaleMode::Manual => {
        for scale in &self.length_scales[..self.cascade_count as usize] {
          check_min("length_scales", *scale, f32::MIN_POSITIVE)?;
        }
      }
    }
    check_min("min_waves_per_cascade", self.min_waves_per_cascade, f32::MIN_POSITIVE)?;
    check_min("depth", self.depth, f32::MIN_POSITIVE)?;
    check_min("gravity", self.gravity, f32::MIN_POSITIVE)
  }

  /// Changing either of these reallocates the wave field.
  pub fn layout_differs(&self, other: &SimulationSettings) -> bool {
    self.resolution != other.resolution || self.cascade_count != other.cascade_count
  }
}

fn check_min(field: &'static str, value: f32, min: f32) -> Result<(), ConfigError> {
  if value.is_finite() && value >= min {
    Ok(())
  } else {
    Err(ConfigError::OutOfRange { field, value })
  }
}

fn check_unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::OutOfRange { field, value })
  }
}
