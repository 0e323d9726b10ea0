use std::sync::Arc;

use crate::gpu;

pub const OUTPUT_MIP_LEVELS: u32 = 4;

/// Textures of one resolution/cascade-count configuration.
///
/// Layers are per cascade, except `amplitudes` which holds two layers per cascade: the
/// displacement set and the derivative set, each packing four real fields as two complex ones.
pub struct WaveField {
  size: u32,
  cascade_count: u32,

  pub(crate) noise: Arc<wgpu::Texture>,
  pub(crate) h0k: Arc<wgpu::Texture>,
  pub(crate) waves_data: Arc<wgpu::Texture>,
  pub(crate) h0: Arc<wgpu::Texture>,
  pub(crate) amplitudes: Arc<wgpu::Texture>,
  pub(crate) displacement: Arc<wgpu::Texture>,
  pub(crate) derivatives: Arc<wgpu::Texture>,
}

impl WaveField {
  pub fn new(device: &wgpu::Device, size: u32, cascade_count: u32) -> Self {
    log::info!("Allocating wave field {}x{} with {} cascades", size, size, cascade_count);

    let texture = |label: &str, layers: u32, mip_level_count: u32| {
      Arc::new(gpu::create_texture(device, label, size, layers, mip_level_count))
    };

    Self {
      size,
      cascade_count,
      noise: texture("Noise texture", cascade_count, 1),
      h0k: texture("H0k texture", cascade_count, 1),
      waves_data: texture("Waves data texture", cascade_count, 1),
      h0: texture("H0 texture", cascade_count, 1),
      amplitudes: texture("Amplitudes", cascade_count * 2, 1),
      displacement: texture("Displacement", cascade_count, OUTPUT_MIP_LEVELS),
      derivatives: texture("Derivatives", cascade_count, OUTPUT_MIP_LEVELS),
    }
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  pub fn cascade_count(&self) -> u32 {
    self.cascade_count
  }

  /// Per cascade `(λDx, Dy, λDz, λDxz)`.
  pub fn displacement_texture(&self) -> &Arc<wgpu::Texture> {
    &self.displacement
  }

  /// Per cascade `(∂Dy/∂x, ∂Dy/∂z, λ∂Dx/∂x, λ∂Dz/∂z)`.
  pub fn derivatives_texture(&self) -> &Arc<wgpu::Texture> {
    &self.derivatives
  }

  /// Static spectrum: `(H0(k), conj(H0(-k)))`.
  pub fn h0_texture(&self) -> &Arc<wgpu::Texture> {
    &self.h0
  }

  /// Per wave `(kx, chop/k, kz, ω)`.
  pub fn waves_data_texture(&self) -> &Arc<wgpu::Texture> {
    &self.waves_data
  }

  pub fn amplitudes_texture(&self) -> &Arc<wgpu::Texture> {
    &self.amplitudes
  }

  pub fn noise_texture(&self) -> &Arc<wgpu::Texture> {
    &self.noise
  }
}
