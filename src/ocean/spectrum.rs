use std::f32::consts::PI;

use crate::ocean::ocean_parameters::{EnergySpectrumModel, SpectrumParams};
use crate::ocean::utils::lerp;

/// `k·depth` beyond which the water counts as deep; keeps `tanh`/`cosh` finite.
const DEEP_WATER_LIMIT: f32 = 20.0;
const BASE_SPREAD_POWER: f32 = 16.0;
const EXTRA_SPREAD_POWER: f32 = 64.0;

const MODEL_PIERSON_MOSKOWITZ: u32 = 0;
const MODEL_JONSWAP: u32 = 1;
const MODEL_TMA: u32 = 2;

/// Angular frequency of a wave with wavenumber `k` over water of the given depth.
pub fn dispersion(k: f32, gravity: f32, depth: f32) -> f32 {
  (gravity * k * (k * depth).min(DEEP_WATER_LIMIT).tanh()).sqrt()
}

/// `dω/dk`, used to convert a frequency spectrum into a wavenumber spectrum.
pub fn dispersion_derivative(k: f32, gravity: f32, depth: f32) -> f32 {
  if k <= 0.0 {
    return 0.0;
  }

  let kd = (k * depth).min(DEEP_WATER_LIMIT);
  let th = kd.tanh();
  let ch = kd.cosh();
  let omega = dispersion(k, gravity, depth);
  gravity * (depth * k / ch / ch + th) / omega / 2.0
}

pub fn jonswap_alpha(g: f32, fetch: f32, wind_speed: f32) -> f32 {
  0.076 * f32::powf(g * fetch / wind_speed / wind_speed, -0.22)
}

pub fn jonswap_peak_frequency(g: f32, fetch: f32, wind_speed: f32) -> f32 {
  22.0 * f32::powf(wind_speed * fetch / g / g, -0.33)
}

/// Kitaigorodskii finite-depth attenuation.
pub fn tma_correction(omega: f32, gravity: f32, depth: f32) -> f32 {
  let omega_h = omega * (depth / gravity).sqrt();
  if omega_h <= 1.0 {
    0.5 * omega_h * omega_h
  } else if omega_h < 2.0 {
    1.0 - 0.5 * (2.0 - omega_h) * (2.0 - omega_h)
  } else {
    1.0
  }
}

/// Precomputed form of [`SpectrumParams`] handed to the spectrum kernels.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpectrumShape {
  pub model: u32,
  pub scale: f32,
  /// Wind direction in radians.
  pub angle: f32,
  pub alignment: f32,
  pub extra_alignment: f32,
  pub alpha: f32,
  pub peak_omega: f32,
  pub gamma: f32,
  pub cutoff_wavelength: f32,
  /// `cos-2s` normalization for `s = alignment·16`.
  pub base_normalization: f32,
  /// `cos-2s` normalization for `s = 64`.
  pub extra_normalization: f32,
  _padding: u32,
}

impl SpectrumShape {
  pub fn from_params(params: &SpectrumParams, gravity: f32) -> Self {
    let (alpha, peak_omega) = if params.wind_speed <= 0.0 {
      (0.0, 0.0)
    } else {
      match params.model {
        EnergySpectrumModel::PiersonMoskowitz => (0.0081, 0.855 * gravity / params.wind_speed),
        EnergySpectrumModel::Jonswap | EnergySpectrumModel::Tma => (
          jonswap_alpha(gravity, params.fetch, params.wind_speed),
          jonswap_peak_frequency(gravity, params.fetch, params.wind_speed),
        ),
      }
    };

    Self {
      model: match params.model {
        EnergySpectrumModel::PiersonMoskowitz => MODEL_PIERSON_MOSKOWITZ,
        EnergySpectrumModel::Jonswap => MODEL_JONSWAP,
        EnergySpectrumModel::Tma => MODEL_TMA,
      },
      scale: params.scale,
      angle: params.wind_direction.to_radians(),
      alignment: params.alignment,
      extra_alignment: params.extra_alignment,
      alpha,
      peak_omega,
      gamma: params.peaking,
      cutoff_wavelength: params.cutoff_wavelength,
      base_normalization: cos_2s_normalization(params.alignment * BASE_SPREAD_POWER),
      extra_normalization: cos_2s_normalization(EXTRA_SPREAD_POWER),
      _padding: 0,
    }
  }

  /// A shape that contributes nothing.
  pub fn silent() -> Self {
    bytemuck::Zeroable::zeroed()
  }

  /// Frequency spectrum `S(ω)`, unscaled.
  pub fn frequency_spectrum(&self, omega: f32, gravity: f32, depth: f32) -> f32 {
    if omega <= 0.0 || self.alpha <= 0.0 || self.peak_omega <= 0.0 {
      return 0.0;
    }

    let ratio = self.peak_omega / omega;
    let pierson_moskowitz =
      self.alpha * gravity * gravity / omega.powi(5) * (-1.25 * ratio.powi(4)).exp();

    match self.model {
      MODEL_PIERSON_MOSKOWITZ => pierson_moskowitz,
      MODEL_TMA => {
        pierson_moskowitz * self.peak_enhancement(omega) * tma_correction(omega, gravity, depth)
      }
      _ => pierson_moskowitz * self.peak_enhancement(omega),
    }
  }

  fn peak_enhancement(&self, omega: f32) -> f32 {
    let sigma = if omega <= self.peak_omega { 0.07 } else { 0.09 };
    let d = omega - self.peak_omega;
    let r = (-d * d / (2.0 * sigma * sigma * self.peak_omega * self.peak_omega)).exp();
    self.gamma.powf(r)
  }

  /// Omnidirectional wavenumber spectrum `S(ω(k))·dω/dk`, scaled.
  pub fn energy_density(&self, k: f32, gravity: f32, depth: f32) -> f32 {
    if k <= 0.0 || self.scale <= 0.0 {
      return 0.0;
    }
    if self.cutoff_wavelength > 0.0 && 2.0 * PI / k < self.cutoff_wavelength {
      return 0.0;
    }

    let omega = dispersion(k, gravity, depth);
    self.scale
      * self.frequency_spectrum(omega, gravity, depth)
      * dispersion_derivative(k, gravity, depth)
  }

  /// Directional density over the wavenumber plane. Integrating over `dkx dkz` gives the
  /// height variance.
  pub fn density(&self, kx: f32, kz: f32, gravity: f32, depth: f32) -> f32 {
    let k = (kx * kx + kz * kz).sqrt();
    if k <= 0.0 {
      return 0.0;
    }

    let theta = kz.atan2(kx) - self.angle;
    self.energy_density(k, gravity, depth)
      * directional_spread(theta, self.alignment, self.extra_alignment)
      / k
  }
}

/// Omnidirectional energy density at wavenumber `k` for a parameter set.
pub fn energy_density(k: f32, params: &SpectrumParams, gravity: f32, depth: f32) -> f32 {
  SpectrumShape::from_params(params, gravity).energy_density(k, gravity, depth)
}

/// Angular weighting that integrates to one over `[-π, π]`.
pub fn directional_spread(theta: f32, alignment: f32, extra_alignment: f32) -> f32 {
  let base = cos_2s(theta, alignment * BASE_SPREAD_POWER);
  if extra_alignment <= 0.0 {
    return base;
  }
  lerp(base, cos_2s(theta, EXTRA_SPREAD_POWER), extra_alignment)
}

fn cos_2s(theta: f32, s: f32) -> f32 {
  let normalization = cos_2s_normalization(s);
  if s <= 0.0 {
    return normalization;
  }
  normalization * (theta * 0.5).cos().abs().powf(2.0 * s)
}

pub fn cos_2s_normalization(s: f32) -> f32 {
  let s = s as f64;
  let ln = ln_gamma(s + 1.0) - ln_gamma(s + 0.5);
  (ln.exp() / (2.0 * std::f64::consts::PI.sqrt())) as f32
}

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFICIENTS: [f64; 9] = [
  0.999_999_999_999_809_9,
  676.520_368_121_885_1,
  -1_259.139_216_722_402_8,
  771.323_428_777_653_1,
  -176.615_029_162_140_6,
  12.507_343_278_686_905,
  -0.138_571_095_265_720_12,
  9.984_369_578_019_572e-6,
  1.505_632_735_149_311_6e-7,
];

/// `ln Γ(x)` for `x >= 0.5`.
pub fn ln_gamma(x: f64) -> f64 {
  let x = x - 1.0;
  let mut a = LANCZOS_COEFFICIENTS[0];
  for (i, c) in LANCZOS_COEFFICIENTS.iter().enumerate().skip(1) {
    a += c / (x + i as f64);
  }
  let t = x + LANCZOS_G + 0.5;
  0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}
