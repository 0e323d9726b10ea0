use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ocean::utils::lerp;

pub const EQUALIZER_X_MIN: f32 = -1.5;
pub const EQUALIZER_X_MAX: f32 = 3.5;
pub const EQUALIZER_RESOLUTION: usize = 128;
pub const MIN_FILTER_WIDTH: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterKind {
  #[default]
  Bell,
  HighShelf,
  LowShelf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EqualizerChannel {
  #[default]
  Scale,
  Chop,
}

/// One parametric band over `log10(wavelength)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerFilter {
  pub kind: FilterKind,
  pub channel: EqualizerChannel,
  pub center: f32,
  pub value: f32,
  pub width: f32,
}

impl Default for EqualizerFilter {
  fn default() -> Self {
    Self {
      kind: FilterKind::Bell,
      channel: EqualizerChannel::Scale,
      center: 1.0,
      value: 0.0,
      width: 0.5,
    }
  }
}

impl EqualizerFilter {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.width >= MIN_FILTER_WIDTH) || !self.width.is_finite() {
      return Err(ConfigError::OutOfRange {
        field: "equalizer.width",
        value: self.width,
      });
    }
    if !self.center.is_finite() || !self.value.is_finite() {
      return Err(ConfigError::OutOfRange {
        field: "equalizer.value",
        value: self.value,
      });
    }
    Ok(())
  }

  pub fn evaluate(&self, x: f32) -> f32 {
    let width = self.width.max(MIN_FILTER_WIDTH);
    let u = (x - self.center) / width;
    match self.kind {
      FilterKind::Bell => self.value * (-u * u).exp(),
      FilterKind::HighShelf => self.value * 0.5 * (1.0 + u.tanh()),
      FilterKind::LowShelf => self.value * 0.5 * (1.0 - u.tanh()),
    }
  }
}

/// Filter list describing how a preset reshapes the spectrum by wavelength.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerCurve {
  pub filters: Vec<EqualizerFilter>,
}

impl EqualizerCurve {
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.filters.iter().try_for_each(EqualizerFilter::validate)
  }

  /// Multiplier for `channel` at `x`, never negative.
  pub fn evaluate(&self, channel: EqualizerChannel, x: f32) -> f32 {
    let sum: f32 = self
      .filters
      .iter()
      .filter(|filter| filter.channel == channel)
      .map(|filter| filter.evaluate(x))
      .sum();
    (1.0 + sum).max(0.0)
  }

  pub fn bake(&self) -> BakedEqualizer {
    let samples = (0..EQUALIZER_RESOLUTION)
      .map(|i| {
        let x = sample_position(i);
        [
          self.evaluate(EqualizerChannel::Scale, x),
          self.evaluate(EqualizerChannel::Chop, x),
        ]
      })
      .collect();

    BakedEqualizer { samples }
  }
}

fn sample_position(i: usize) -> f32 {
  let t = i as f32 / (EQUALIZER_RESOLUTION - 1) as f32;
  lerp(EQUALIZER_X_MIN, EQUALIZER_X_MAX, t)
}

/// Lookup table of an [`EqualizerCurve`]: `[scale, chop]` per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct BakedEqualizer {
  samples: Vec<[f32; 2]>,
}

impl BakedEqualizer {
  /// Identity curve: both channels are 1 everywhere.
  pub fn flat() -> Self {
    Self {
      samples: vec![[1.0, 1.0]; EQUALIZER_RESOLUTION],
    }
  }

  pub fn samples(&self) -> &[[f32; 2]] {
    &self.samples
  }

  /// Linearly interpolated `[scale, chop]` at `x`, clamped to the baked domain.
  pub fn sample(&self, x: f32) -> [f32; 2] {
    let x = x.clamp(EQUALIZER_X_MIN, EQUALIZER_X_MAX);
    let position =
      (x - EQUALIZER_X_MIN) / (EQUALIZER_X_MAX - EQUALIZER_X_MIN) * (EQUALIZER_RESOLUTION - 1) as f32;
    let i0 = (position.floor() as usize).min(EQUALIZER_RESOLUTION - 1);
    let i1 = (i0 + 1).min(EQUALIZER_RESOLUTION - 1);
    let t = position - i0 as f32;

    let a = self.samples[i0];
    let b = self.samples[i1];
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t)]
  }
}

/// `log10` of the wavelength belonging to wavenumber `k`.
pub fn wavelength_coordinate(k: f32) -> f32 {
  (2.0 * PI / k.max(1e-6)).log10()
}
