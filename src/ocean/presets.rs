use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::ocean::equalizer::{BakedEqualizer, EqualizerCurve};
use crate::ocean::ocean_parameters::{EnergySpectrumModel, FoamParams, SpectrumParams};
use crate::ocean::utils::{inverse_lerp, lerp, saturate};

/// Named wave configuration placed on the wind-force axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WavePreset {
  pub name: String,
  pub wind_force: f32,
  pub spectrum: SpectrumParams,
  pub foam: FoamParams,
  pub chop: f32,
  pub equalizer: EqualizerCurve,
}

impl Default for WavePreset {
  fn default() -> Self {
    Self {
      name: String::from("preset"),
      wind_force: 0.0,
      spectrum: SpectrumParams::default(),
      foam: FoamParams::default(),
      chop: 1.0,
      equalizer: EqualizerCurve::default(),
    }
  }
}

impl WavePreset {
  pub fn validate(&self) -> std::result::Result<(), ConfigError> {
    let check = || -> std::result::Result<(), ConfigError> {
      if !(self.wind_force >= 0.0) || !self.wind_force.is_finite() {
        return Err(ConfigError::OutOfRange {
          field: "wind_force",
          value: self.wind_force,
        });
      }
      if !(self.chop >= 0.0) || !self.chop.is_finite() {
        return Err(ConfigError::OutOfRange {
          field: "chop",
          value: self.chop,
        });
      }
      self.spectrum.validate()?;
      self.foam.validate()?;
      self.equalizer.validate()
    };

    check().map_err(|source| ConfigError::Preset {
      name: self.name.clone(),
      source: Box::new(source),
    })
  }
}

/// Presets kept sorted by wind force, with their equalizers baked alongside.
#[derive(Debug, Clone, Default)]
pub struct PresetProvider {
  presets: Vec<WavePreset>,
  equalizers: Vec<Arc<BakedEqualizer>>,
}

impl PresetProvider {
  pub fn new(presets: Vec<WavePreset>) -> std::result::Result<Self, ConfigError> {
    if presets.is_empty() {
      return Err(ConfigError::NoPresets);
    }

    let mut provider = Self::default();
    for preset in presets {
      provider.push(preset)?;
    }
    Ok(provider)
  }

  /// Single preset used as-is whatever the wind force.
  pub fn fixed(preset: WavePreset) -> std::result::Result<Self, ConfigError> {
    Self::new(vec![preset])
  }

  pub fn push(&mut self, preset: WavePreset) -> std::result::Result<(), ConfigError> {
    preset.validate()?;
    self.equalizers.push(Arc::new(preset.equalizer.bake()));
    self.presets.push(preset);
    self.sort();
    Ok(())
  }

  pub fn set(&mut self, index: usize, preset: WavePreset) -> std::result::Result<(), ConfigError> {
    preset.validate()?;
    if index >= self.presets.len() {
      return self.push(preset);
    }

    self.equalizers[index] = Arc::new(preset.equalizer.bake());
    self.presets[index] = preset;
    self.sort();
    Ok(())
  }

  pub fn remove(&mut self, index: usize) -> Option<WavePreset> {
    if index >= self.presets.len() {
      return None;
    }
    self.equalizers.remove(index);
    Some(self.presets.remove(index))
  }

  fn sort(&mut self) {
    let mut order: Vec<usize> = (0..self.presets.len()).collect();
    order.sort_by(|&a, &b| self.presets[a].wind_force.total_cmp(&self.presets[b].wind_force));

    let presets = order.iter().map(|&i| self.presets[i].clone()).collect();
    let equalizers = order.iter().map(|&i| self.equalizers[i].clone()).collect();
    self.presets = presets;
    self.equalizers = equalizers;
  }

  pub fn presets(&self) -> &[WavePreset] {
    &self.presets
  }

  pub fn len(&self) -> usize {
    self.presets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.presets.is_empty()
  }

  pub fn is_fixed(&self) -> bool {
    self.presets.len() == 1
  }

  pub fn max_wind_force(&self) -> f32 {
    self.presets.last().map(|p| p.wind_force).unwrap_or(0.0)
  }

  /// Bracketing pair and interpolation factor for a normalized wind force.
  pub fn locate(&self, wind_force01: f32) -> Option<(usize, usize, f32)> {
    let count = self.presets.len();
    match count {
      0 => return None,
      1 => return Some((0, 0, 0.0)),
      _ => {}
    }

    let wind_force = saturate(wind_force01) * self.max_wind_force();
    let first = &self.presets[0];
    let last = &self.presets[count - 1];

    if wind_force <= first.wind_force {
      return Some((0, 1, 0.0));
    }
    if wind_force >= last.wind_force {
      return Some((count - 2, count - 1, 1.0));
    }

    for i in 0..count - 1 {
      let (low, high) = (&self.presets[i], &self.presets[i + 1]);
      if wind_force < high.wind_force {
        return Some((i, i + 1, inverse_lerp(low.wind_force, high.wind_force, wind_force)));
      }
    }

    Some((count - 2, count - 1, 1.0))
  }

  pub fn blend(&self, wind_force01: f32) -> Option<BlendedPreset> {
    let (low, high, t) = self.locate(wind_force01)?;
    let a = &self.presets[low];
    let b = &self.presets[high];

    Some(BlendedPreset {
      low,
      high,
      t,
      wind_force: lerp(a.wind_force, b.wind_force, t),
      spectrum: a.spectrum.lerp(&b.spectrum, t),
      foam: a.foam.lerp(&b.foam, t),
      chop: lerp(a.chop, b.chop, t),
      equalizer_low: self.equalizers[low].clone(),
      equalizer_high: self.equalizers[high].clone(),
    })
  }
}

/// Effective inputs for one frame. Equalizers stay separate and are mixed per sample.
#[derive(Debug, Clone)]
pub struct BlendedPreset {
  pub low: usize,
  pub high: usize,
  pub t: f32,
  pub wind_force: f32,
  pub spectrum: SpectrumParams,
  pub foam: FoamParams,
  pub chop: f32,
  pub equalizer_low: Arc<BakedEqualizer>,
  pub equalizer_high: Arc<BakedEqualizer>,
}

impl BlendedPreset {
  /// Whether a change from `previous` requires the static spectrum to be rebuilt.
  pub fn spectrum_differs(&self, previous: &BlendedPreset) -> bool {
    self.spectrum != previous.spectrum
      || self.t != previous.t
      || self.low != previous.low
      || self.high != previous.high
      || !Arc::ptr_eq(&self.equalizer_low, &previous.equalizer_low)
      || !Arc::ptr_eq(&self.equalizer_high, &previous.equalizer_high)
  }
}

/// Local wind sea plus optional swell, both driven by one wind-force input.
#[derive(Debug, Clone)]
pub struct PresetBlender {
  local: PresetProvider,
  swell: Option<PresetProvider>,
  wind_force01: f32,
}

#[derive(Debug, Clone)]
pub struct BlendedFrame {
  pub local: BlendedPreset,
  pub swell: Option<BlendedPreset>,
}

impl PresetBlender {
  pub fn new(local: PresetProvider, swell: Option<PresetProvider>) -> Self {
    Self {
      local,
      swell,
      wind_force01: 0.0,
    }
  }

  pub fn set_wind_force(&mut self, wind_force01: f32) {
    self.wind_force01 = saturate(wind_force01);
  }

  pub fn wind_force(&self) -> f32 {
    self.wind_force01
  }

  pub fn local(&self) -> &PresetProvider {
    &self.local
  }

  pub fn local_mut(&mut self) -> &mut PresetProvider {
    &mut self.local
  }

  pub fn swell(&self) -> Option<&PresetProvider> {
    self.swell.as_ref()
  }

  pub fn set_swell(&mut self, swell: Option<PresetProvider>) {
    self.swell = swell;
  }

  pub fn is_fixed(&self) -> bool {
    self.local.is_fixed()
  }

  pub fn blend(&self) -> Option<BlendedFrame> {
    let local = self.local.blend(self.wind_force01)?;
    let swell = self
      .swell
      .as_ref()
      .and_then(|swell| swell.blend(self.wind_force01));
    Some(BlendedFrame { local, swell })
  }
}

/// Serializable preset list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetLibrary {
  pub presets: Vec<WavePreset>,
}

impl PresetLibrary {
  pub fn from_json_str(json: &str) -> Result<Self> {
    let library: PresetLibrary = serde_json::from_str(json)?;
    for preset in &library.presets {
      preset.validate()?;
    }
    Ok(library)
  }

  pub fn to_json_string(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    log::info!("Loading wave presets from {}", path.display());
    let json = std::fs::read_to_string(path)?;
    Self::from_json_str(&json)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, self.to_json_string()?)?;
    Ok(())
  }

  pub fn into_provider(self) -> std::result::Result<PresetProvider, ConfigError> {
    PresetProvider::new(self.presets)
  }

  pub fn builtin() -> Self {
    let preset = |name: &str, wind_force: f32, wind_speed: f32, chop: f32, coverage: f32| WavePreset {
      name: name.to_string(),
      wind_force,
      spectrum: SpectrumParams {
        model: EnergySpectrumModel::Jonswap,
        wind_speed,
        alignment: lerp(0.3, 0.8, wind_force / 11.0),
        ..Default::default()
      },
      foam: FoamParams {
        coverage,
        trail_strength: lerp(0.2, 0.8, wind_force / 11.0),
        ..Default::default()
      },
      chop,
      equalizer: EqualizerCurve::default(),
    };

    Self {
      presets: vec![
        preset("calm", 1.0, 1.5, 0.6, 0.05),
        preset("breeze", 3.0, 5.0, 0.8, 0.2),
        preset("moderate", 5.0, 9.0, 1.0, 0.4),
        preset("strong", 8.0, 15.0, 1.2, 0.6),
        preset("storm", 11.0, 25.0, 1.3, 0.8),
      ],
    }
  }

  /// Long, narrow swell with no local wind sea character.
  pub fn builtin_swell() -> Self {
    Self {
      presets: vec![WavePreset {
        name: String::from("swell"),
        wind_force: 0.0,
        spectrum: SpectrumParams {
          model: EnergySpectrumModel::PiersonMoskowitz,
          wind_speed: 8.0,
          wind_direction: 30.0,
          scale: 0.3,
          alignment: 1.0,
          extra_alignment: 0.5,
          ..Default::default()
        },
        ..Default::default()
      }],
    }
  }
}
