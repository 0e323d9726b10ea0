use std::f32::consts::PI;
use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::gpu::{self, Texel};
use crate::ocean::cascade_domain::CascadeDomain;
use crate::ocean::equalizer::{wavelength_coordinate, BakedEqualizer, EQUALIZER_RESOLUTION};
use crate::ocean::ocean_parameters::{SpectrumParams, MAX_CASCADES};
use crate::ocean::presets::BlendedFrame;
use crate::ocean::spectrum::{dispersion, SpectrumShape};
use crate::ocean::utils::{dispatch_grid, lerp};
use crate::ocean::wave_field::WaveField;

/// Wavenumbers below this are treated as this when dividing by `k`.
pub const MIN_WAVENUMBER: f32 = 1e-4;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Parameters {
  size: u32,
  cascade_count: u32,
  gravity: f32,
  depth: f32,
  length_scales: [f32; MAX_CASCADES],
  cut_off_low: [f32; MAX_CASCADES],
  cut_off_high: [f32; MAX_CASCADES],
  equalizer_blend: f32,
  min_wavenumber: f32,
  _padding: [f32; 2],
  local: SpectrumShape,
  swell: SpectrumShape,
}

/// Wave vector of a texel, zero frequency at the grid centre.
pub fn wave_vector(size: u32, domain: &CascadeDomain, x: u32, y: u32, cascade: usize) -> (f32, f32) {
  let delta_k = domain.delta_k(cascade);
  let half = (size / 2) as f32;
  ((x as f32 - half) * delta_k, (y as f32 - half) * delta_k)
}

/// Everything the static phase reads besides the noise.
#[derive(Debug, Clone)]
pub struct SpectrumInputs {
  pub local: SpectrumShape,
  pub swell: SpectrumShape,
  pub equalizer_low: Arc<BakedEqualizer>,
  pub equalizer_high: Arc<BakedEqualizer>,
  pub equalizer_blend: f32,
  pub gravity: f32,
  pub depth: f32,
}

impl SpectrumInputs {
  pub fn from_blend(frame: &BlendedFrame, gravity: f32, depth: f32) -> Self {
    let swell = frame
      .swell
      .as_ref()
      .map(|swell| SpectrumShape::from_params(&swell.spectrum, gravity))
      .unwrap_or_else(SpectrumShape::silent);

    Self {
      local: SpectrumShape::from_params(&frame.local.spectrum, gravity),
      swell,
      equalizer_low: frame.local.equalizer_low.clone(),
      equalizer_high: frame.local.equalizer_high.clone(),
      equalizer_blend: frame.local.t,
      gravity,
      depth,
    }
  }

  /// Local spectrum only, no swell, flat equalizer.
  pub fn local_only(params: &SpectrumParams, gravity: f32, depth: f32) -> Self {
    let flat = Arc::new(BakedEqualizer::flat());
    Self {
      local: SpectrumShape::from_params(params, gravity),
      swell: SpectrumShape::silent(),
      equalizer_low: flat.clone(),
      equalizer_high: flat,
      equalizer_blend: 0.0,
      gravity,
      depth,
    }
  }

  /// `[scale, chop]` equalizer multipliers at wavenumber `k`.
  pub fn equalizer(&self, k: f32) -> [f32; 2] {
    let x = wavelength_coordinate(k);
    let a = self.equalizer_low.sample(x);
    if self.equalizer_blend <= 0.0 {
      return a;
    }
    let b = self.equalizer_high.sample(x);
    [
      lerp(a[0], b[0], self.equalizer_blend),
      lerp(a[1], b[1], self.equalizer_blend),
    ]
  }

  /// Directional density of local sea plus swell, reshaped by the equalizer.
  pub fn density(&self, kx: f32, kz: f32) -> f32 {
    let k = (kx * kx + kz * kz).sqrt();
    if k <= 0.0 {
      return 0.0;
    }

    let local = self.local.density(kx, kz, self.gravity, self.depth);
    let swell = self.swell.density(kx, kz, self.gravity, self.depth);
    (local + swell) * self.equalizer(k)[0]
  }

  /// Per wave `(kx, chop/k, kz, ω)`, as the static phase writes it.
  pub fn waves_data(&self, kx: f32, kz: f32) -> Texel {
    let k = (kx * kx + kz * kz).sqrt().max(MIN_WAVENUMBER);
    let chop = self.equalizer(k)[1];
    [kx, chop / k, kz, dispersion(k, self.gravity, self.depth)]
  }

  /// Both equalizers interleaved per sample for the kernel's lookup buffer.
  fn equalizer_table(&self) -> Vec<[f32; 4]> {
    self
      .equalizer_low
      .samples()
      .iter()
      .zip(self.equalizer_high.samples())
      .map(|(low, high)| [low[0], low[1], high[0], high[1]])
      .collect()
  }
}

/// Height variance the static phase should produce for one cascade: `Σ F(k)·Δk²` over the
/// texels inside the cascade's band.
pub fn expected_height_variance(
  size: u32,
  domain: &CascadeDomain,
  inputs: &SpectrumInputs,
  cascade: usize,
) -> f32 {
  if cascade >= domain.cascade_count as usize {
    return 0.0;
  }

  let delta_k = domain.delta_k(cascade);
  let mut variance = 0.0f64;
  for y in 0..size {
    for x in 0..size {
      let (kx, kz) = wave_vector(size, domain, x, y, cascade);
      let k = (kx * kx + kz * kz).sqrt();
      if domain.contains(cascade, k) {
        variance += (inputs.density(kx, kz) * delta_k * delta_k) as f64;
      }
    }
  }
  variance as f32
}

/// Two independent standard normal values per texel (`rg`), one layer per cascade.
fn generate_noise_data(size: u32, layers: u32, seed: u64) -> Vec<Texel> {
  let mut rng = StdRng::seed_from_u64(seed);
  let texels = (size * size * layers) as usize;

  (0..texels)
    .map(|_| {
      let u1: f32 = 1.0 - rng.gen::<f32>();
      let u2: f32 = rng.gen();
      let r = (-2.0 * u1.ln()).sqrt();
      let theta = 2.0 * PI * u2;
      [r * theta.cos(), r * theta.sin(), 0.0, 0.0]
    })
    .collect()
}

pub struct InitialSpectrumPipeline {
  size: u32,
  cascade_count: u32,
  noise_data: Vec<Texel>,
  noise_texture: Arc<wgpu::Texture>,

  initial_spectrum_pipeline: wgpu::ComputePipeline,
  conjugated_spectrum_pipeline: wgpu::ComputePipeline,
  initial_spectrum_bind_group: wgpu::BindGroup,
  conjugated_spectrum_bind_group: wgpu::BindGroup,

  parameters_buffer: wgpu::Buffer,
  equalizer_buffer: wgpu::Buffer,
}

impl InitialSpectrumPipeline {
  pub fn init(device: &wgpu::Device, field: &WaveField, seed: u64) -> Self {
    let size = field.size();
    let cascade_count = field.cascade_count();

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("Initial spectrum shader"),
      source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/initial_spectrum.wgsl").into()),
    });

    let initial_spectrum_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("Initial spectrum bind group layout"),
      entries: &[
        gpu::uniform_entry(0, false),
        gpu::storage_buffer_entry(1),
        gpu::texture_entry(2),
        gpu::storage_texture_entry(3),
        gpu::storage_texture_entry(4),
      ],
    });
    let conjugated_spectrum_layout =
      device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Conjugated spectrum bind group layout"),
        entries: &[
          gpu::uniform_entry(0, false),
          gpu::texture_entry(5),
          gpu::storage_texture_entry(6),
        ],
      });

    let parameters_buffer = gpu::create_uniform_buffer(
      device,
      "Initial spectrum parameters",
      std::mem::size_of::<Parameters>() as u64,
    );
    let equalizer_buffer = device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("Equalizer buffer"),
      size: (EQUALIZER_RESOLUTION * std::mem::size_of::<[f32; 4]>()) as u64,
      usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
      mapped_at_creation: false,
    });

    let initial_spectrum_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("Initial spectrum bind group"),
      layout: &initial_spectrum_layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: parameters_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 1,
          resource: equalizer_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 2,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.noise, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 3,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.h0k, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 4,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.waves_data, 0)),
        },
      ],
    });
    let conjugated_spectrum_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("Conjugated spectrum bind group"),
      layout: &conjugated_spectrum_layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: parameters_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 5,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.h0k, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 6,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.h0, 0)),
        },
      ],
    });

    Self {
      size,
      cascade_count,
      noise_data: generate_noise_data(size, cascade_count, seed),
      noise_texture: field.noise.clone(),
      initial_spectrum_pipeline: gpu::create_compute_pipeline(
        device,
        "Calculate Initial Spectrum",
        &initial_spectrum_layout,
        &shader,
        "calculate_initial_spectrum",
      ),
      conjugated_spectrum_pipeline: gpu::create_compute_pipeline(
        device,
        "Calculate Conjugated Spectrum",
        &conjugated_spectrum_layout,
        &shader,
        "calculate_conjugated_spectrum",
      ),
      initial_spectrum_bind_group,
      conjugated_spectrum_bind_group,
      parameters_buffer,
      equalizer_buffer,
    }
  }

  pub fn reseed(&mut self, seed: u64) {
    self.noise_data = generate_noise_data(self.size, self.cascade_count, seed);
  }

  /// Records the noise, parameter and equalizer uploads followed by both kernels. Nothing
  /// reaches the GPU unless `encoder` is submitted.
  pub fn dispatch(
    &self,
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    domain: &CascadeDomain,
    inputs: &SpectrumInputs,
  ) {
    let parameters = Parameters {
      size: self.size,
      cascade_count: self.cascade_count.min(domain.cascade_count),
      gravity: inputs.gravity,
      depth: inputs.depth,
      length_scales: domain.length_scales,
      cut_off_low: domain.cutoffs_low,
      cut_off_high: domain.cutoffs_high,
      equalizer_blend: inputs.equalizer_blend,
      min_wavenumber: MIN_WAVENUMBER,
      _padding: [0.0; 2],
      local: inputs.local,
      swell: inputs.swell,
    };
    log::debug!(
      "Initial spectrum: {} cascades, local wind {:.2} rad, swell scale {}",
      parameters.cascade_count,
      inputs.local.angle,
      inputs.swell.scale
    );

    gpu::record_texture_write(device, encoder, &self.noise_texture, &self.noise_data);
    gpu::record_buffer_write(device, encoder, &self.parameters_buffer, bytemuck::bytes_of(&parameters));
    gpu::record_buffer_write(
      device,
      encoder,
      &self.equalizer_buffer,
      bytemuck::cast_slice(&inputs.equalizer_table()),
    );

    let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
      label: Some("Initial Spectrum"),
      timestamp_writes: None,
    });

    compute_pass.set_pipeline(&self.initial_spectrum_pipeline);
    compute_pass.set_bind_group(0, &self.initial_spectrum_bind_group, &[]);
    dispatch_grid(&mut compute_pass, self.size, self.size, self.cascade_count);

    compute_pass.set_pipeline(&self.conjugated_spectrum_pipeline);
    compute_pass.set_bind_group(0, &self.conjugated_spectrum_bind_group, &[]);
    dispatch_grid(&mut compute_pass, self.size, self.size, self.cascade_count);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gpu::{test_context, GpuContext};
  use crate::ocean::cascade_domain::{auto_length_scales, compute_domains};
  use crate::ocean::equalizer::{EqualizerChannel, EqualizerCurve, EqualizerFilter, FilterKind};
  use crate::ocean::ocean_parameters::GRAVITY;

  fn run(context: &GpuContext, field: &WaveField, domain: &CascadeDomain, inputs: &SpectrumInputs) {
    let pipeline = InitialSpectrumPipeline::init(&context.device, field, 5);
    let mut encoder = context
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    pipeline.dispatch(&context.device, &mut encoder, domain, inputs);
    context.queue.submit(Some(encoder.finish()));
  }

  #[test]
  fn noise_is_standard_normal() {
    let data = generate_noise_data(64, 2, 3);
    let values: Vec<f32> = data.iter().flat_map(|t| [t[0], t[1]]).collect();
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    assert!(mean.abs() < 0.05);
    assert!((variance - 1.0).abs() < 0.06);
  }

  #[test]
  fn noise_depends_only_on_seed() {
    assert_eq!(generate_noise_data(8, 2, 11), generate_noise_data(8, 2, 11));
    assert_ne!(generate_noise_data(8, 2, 11), generate_noise_data(8, 2, 12));
  }

  #[test]
  fn kernel_matches_cpu_spectrum() {
    let Some(context) = test_context() else { return };
    let size = 32;
    let field = WaveField::new(&context.device, size, 2);
    let domain = compute_domains(&auto_length_scales(0.1), size, 1.0, false, 2);
    let mut inputs = SpectrumInputs::local_only(&SpectrumParams::default(), GRAVITY, 500.0);
    inputs.swell = SpectrumShape::from_params(
      &SpectrumParams {
        wind_speed: 12.0,
        wind_direction: 70.0,
        scale: 0.5,
        ..Default::default()
      },
      GRAVITY,
    );
    inputs.equalizer_high = Arc::new(
      EqualizerCurve {
        filters: vec![EqualizerFilter {
          kind: FilterKind::Bell,
          channel: EqualizerChannel::Chop,
          center: 1.0,
          value: 0.5,
          width: 0.5,
        }],
      }
      .bake(),
    );
    inputs.equalizer_blend = 0.5;
    run(&context, &field, &domain, &inputs);

    let noise = generate_noise_data(size, 2, 5);
    for cascade in 0..2u32 {
      let h0k = context.read_texture(&field.h0k, cascade, 0).unwrap();
      let waves = context.read_texture(&field.waves_data, cascade, 0).unwrap();
      let delta_k = domain.delta_k(cascade as usize);

      for y in 0..size {
        for x in 0..size {
          let index = (y * size + x) as usize;
          let (kx, kz) = wave_vector(size, &domain, x, y, cascade as usize);
          let k = (kx * kx + kz * kz).sqrt();

          let expected_waves = inputs.waves_data(kx, kz);
          for c in 0..4 {
            let tolerance = 1e-3 * (1.0 + expected_waves[c].abs());
            assert!((waves[index][c] - expected_waves[c]).abs() <= tolerance, "waves ({}, {})", x, y);
          }

          // Rounding may put texels sitting on a band edge on either side.
          let c = cascade as usize;
          let on_edge = [domain.cutoffs_low[c], domain.cutoffs_high[c]]
            .iter()
            .any(|edge| (k - edge).abs() <= 1e-4 * edge);
          if on_edge {
            continue;
          }

          let amplitude = if domain.contains(c, k) {
            0.5 * inputs.density(kx, kz).sqrt() * delta_k
          } else {
            0.0
          };
          let n = noise[(cascade * size * size) as usize + index];
          for c in 0..2 {
            let expected = n[c] * amplitude;
            let tolerance = 1e-2 * expected.abs() + 1e-7;
            assert!((h0k[index][c] - expected).abs() <= tolerance, "h0k ({}, {})", x, y);
          }
        }
      }
    }
  }

  #[test]
  fn conjugate_companion_mirrors_h0k() {
    let Some(context) = test_context() else { return };
    let field = WaveField::new(&context.device, 16, 2);
    let domain = compute_domains(&auto_length_scales(0.05), 16, 1.0, false, 2);
    let inputs = SpectrumInputs::local_only(&SpectrumParams::default(), GRAVITY, 500.0);
    run(&context, &field, &domain, &inputs);

    for layer in 0..2 {
      let h0k = context.read_texture(&field.h0k, layer, 0).unwrap();
      let h0 = context.read_texture(&field.h0, layer, 0).unwrap();
      for y in 0..16usize {
        for x in 0..16usize {
          let mirror = h0k[((16 - y) % 16) * 16 + (16 - x) % 16];
          let texel = h0[y * 16 + x];
          assert_eq!(texel[2], mirror[0]);
          assert_eq!(texel[3], -mirror[1]);
        }
      }
    }
  }

  #[test]
  fn out_of_band_texels_are_zero() {
    let Some(context) = test_context() else { return };
    let field = WaveField::new(&context.device, 16, 2);
    let domain = compute_domains(&auto_length_scales(0.05), 16, 2.0, false, 2);
    let inputs = SpectrumInputs::local_only(&SpectrumParams::default(), GRAVITY, 500.0);
    run(&context, &field, &domain, &inputs);

    // The centre texel is k = 0.
    assert_eq!(context.read_texture(&field.h0k, 0, 0).unwrap()[8 * 16 + 8], [0.0; 4]);
    assert_eq!(expected_height_variance(16, &domain, &inputs, 3), 0.0);
  }
}
