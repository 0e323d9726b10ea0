use std::f32::consts::PI;

use crate::ocean::ocean_parameters::{LengthScaleMode, SimulationSettings, MAX_CASCADES};

/// Shortest simulated wave spans this many texels.
pub const SMALLEST_WAVE_MULTIPLIER: f32 = 4.0;
pub const AUTO_BASE_LENGTH_SCALE: f32 = 1024.0;
const AUTO_LENGTH_SCALE_FACTORS: [f32; MAX_CASCADES] = [1.0, 1.0 / 4.0, 1.0 / 16.0, 1.0 / 64.0];

/// Patch size and wavenumber band of every cascade. Entries past `cascade_count` are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeDomain {
  pub cascade_count: u32,
  pub resolution: u32,
  pub length_scales: [f32; MAX_CASCADES],
  pub cutoffs_low: [f32; MAX_CASCADES],
  pub cutoffs_high: [f32; MAX_CASCADES],
}

impl CascadeDomain {
  pub fn from_settings(settings: &SimulationSettings) -> Self {
    let length_scales = match settings.length_scale_mode {
      LengthScaleMode::Auto => auto_length_scales(settings.simulation_scale),
      LengthScaleMode::Manual => settings.length_scales,
    };

    compute_domains(
      &length_scales,
      settings.resolution,
      settings.min_waves_per_cascade,
      settings.allow_overlap,
      settings.cascade_count,
    )
  }

  /// Wavenumber spacing of the cascade's grid.
  pub fn delta_k(&self, cascade: usize) -> f32 {
    if self.length_scales[cascade] <= 0.0 {
      return 0.0;
    }
    2.0 * PI / self.length_scales[cascade]
  }

  /// Band test. Bands only touch at their edges, the upper edge belongs to the next cascade.
  pub fn contains(&self, cascade: usize, k: f32) -> bool {
    k >= self.cutoffs_low[cascade] && k < self.cutoffs_high[cascade]
  }
}

pub fn auto_length_scales(simulation_scale: f32) -> [f32; MAX_CASCADES] {
  AUTO_LENGTH_SCALE_FACTORS.map(|factor| simulation_scale * AUTO_BASE_LENGTH_SCALE * factor)
}

pub fn compute_domains(
  length_scales: &[f32; MAX_CASCADES],
  resolution: u32,
  min_waves_per_cascade: f32,
  allow_overlap: bool,
  cascade_count: u32,
) -> CascadeDomain {
  let active = (cascade_count as usize).min(MAX_CASCADES);
  let mut domain = CascadeDomain {
    cascade_count: active as u32,
    resolution,
    length_scales: [0.0; MAX_CASCADES],
    cutoffs_low: [0.0; MAX_CASCADES],
    cutoffs_high: [0.0; MAX_CASCADES],
  };

  let mut previous_high = 0.0f32;
  for i in 0..active {
    let length_scale = length_scales[i];
    let mut low = 2.0 * PI / length_scale * min_waves_per_cascade;
    let mut high = 2.0 * PI * resolution as f32 / length_scale / SMALLEST_WAVE_MULTIPLIER;

    if !allow_overlap && i > 0 {
      low = low.max(previous_high);
    }
    high = high.max(low);

    domain.length_scales[i] = length_scale;
    domain.cutoffs_low[i] = low;
    domain.cutoffs_high[i] = high;
    previous_high = high;
  }

  log::debug!(
    "Cascade domains: scales {:?}, low {:?}, high {:?}",
    domain.length_scales,
    domain.cutoffs_low,
    domain.cutoffs_high
  );

  domain
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_partition(domain: &CascadeDomain) {
    let active = domain.cascade_count as usize;
    for i in 0..active {
      assert!(domain.cutoffs_low[i] <= domain.cutoffs_high[i]);
      if i > 0 {
        assert!(domain.cutoffs_low[i] >= domain.cutoffs_high[i - 1]);
      }
    }
    for i in active..MAX_CASCADES {
      assert_eq!(domain.cutoffs_low[i], 0.0);
      assert_eq!(domain.cutoffs_high[i], 0.0);
    }
  }

  #[test]
  fn auto_scales_form_a_chain() {
    assert_eq!(auto_length_scales(0.5), [512.0, 128.0, 32.0, 8.0]);
  }

  #[test]
  fn bands_do_not_overlap() {
    for resolution in [64, 128, 256, 512] {
      for count in 2..=4 {
        for scales in [
          auto_length_scales(1.0),
          [500.0, 85.0, 10.0, 3.0],
          [40.0, 200.0, 30.0, 900.0],
        ] {
          let domain = compute_domains(&scales, resolution, 2.0, false, count);
          assert_partition(&domain);
        }
      }
    }
  }

  #[test]
  fn overlap_keeps_raw_bands() {
    let scales = auto_length_scales(1.0);
    let domain = compute_domains(&scales, 256, 2.0, true, 2);
    assert!((domain.cutoffs_low[1] - 2.0 * PI / 256.0 * 2.0).abs() < 1e-6);
    assert!(domain.cutoffs_low[1] < domain.cutoffs_high[0]);
  }

  #[test]
  fn inactive_cascades_are_zeroed() {
    let domain = compute_domains(&auto_length_scales(1.0), 128, 2.0, true, 3);
    assert_eq!(domain.length_scales[3], 0.0);
    assert_eq!(domain.cutoffs_low[3], 0.0);
    assert_eq!(domain.cutoffs_high[3], 0.0);
    assert_eq!(domain.delta_k(3), 0.0);
  }

  #[test]
  fn touching_edge_belongs_to_the_finer_cascade() {
    let domain = compute_domains(&auto_length_scales(1.0), 64, 2.0, false, 2);
    let edge = domain.cutoffs_high[0];
    assert!(!domain.contains(0, edge));
    assert!(domain.contains(1, edge));
  }
}
