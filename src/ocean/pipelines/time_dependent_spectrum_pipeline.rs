use num_complex::Complex32;

use crate::gpu::{self, Texel};
use crate::ocean::utils::dispatch_grid;
use crate::ocean::wave_field::WaveField;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Parameters {
  time: f32,
  size: u32,
  cascade_count: u32,
  _padding: u32,
}

#[inline]
fn pack(a: Complex32, b: Complex32) -> Complex32 {
  // Both fields are real in space, so `a + i·b` separates again after the inverse transform.
  Complex32::new(a.re - b.im, a.im + b.re)
}

/// Evolves one wave to `time` and returns the packed displacement and derivative texels.
///
/// `h0` is `(H0(k), conj(H0(-k)))`, `waves` is `(kx, chop/k, kz, ω)`.
pub fn evolve_amplitude(h0: Texel, waves: Texel, time: f32) -> [Texel; 2] {
  let phase = waves[3] * time;
  let exponent = Complex32::new(phase.cos(), phase.sin());

  let h = Complex32::new(h0[0], h0[1]) * exponent + Complex32::new(h0[2], h0[3]) * exponent.conj();
  let ih = Complex32::new(-h.im, h.re);

  let (kx, one_over_k, kz) = (waves[0], waves[1], waves[2]);

  let displacement_x = ih * kx * one_over_k;
  let displacement_y = h;
  let displacement_z = ih * kz * one_over_k;

  let displacement_x_dx = -h * kx * kx * one_over_k;
  let displacement_y_dx = ih * kx;
  let displacement_z_dx = -h * kx * kz * one_over_k;

  let displacement_y_dz = ih * kz;
  let displacement_z_dz = -h * kz * kz * one_over_k;

  let dx_dz = pack(displacement_x, displacement_z);
  let dy_dxz = pack(displacement_y, displacement_z_dx);
  let dyx_dyz = pack(displacement_y_dx, displacement_y_dz);
  let dxx_dzz = pack(displacement_x_dx, displacement_z_dz);

  [
    [dx_dz.re, dx_dz.im, dy_dxz.re, dy_dxz.im],
    [dyx_dyz.re, dyx_dyz.im, dxx_dzz.re, dxx_dzz.im],
  ]
}

pub struct TimeDependentSpectrumPipeline {
  size: u32,
  cascade_count: u32,
  pipeline: wgpu::ComputePipeline,
  bind_group: wgpu::BindGroup,
  parameters_buffer: wgpu::Buffer,
}

impl TimeDependentSpectrumPipeline {
  pub fn init(device: &wgpu::Device, field: &WaveField) -> Self {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("Time-dependent spectrum shader"),
      source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/time_dependent_spectrum.wgsl").into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("Time-dependent spectrum bind group layout"),
      entries: &[
        gpu::uniform_entry(0, false),
        gpu::texture_entry(1),
        gpu::texture_entry(2),
        gpu::storage_texture_entry(3),
      ],
    });

    let parameters_buffer = gpu::create_uniform_buffer(
      device,
      "Time-dependent spectrum parameters",
      std::mem::size_of::<Parameters>() as u64,
    );

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("Time-dependent spectrum bind group"),
      layout: &bind_group_layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: parameters_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 1,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.h0, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 2,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.waves_data, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 3,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.amplitudes, 0)),
        },
      ],
    });

    let pipeline = gpu::create_compute_pipeline(
      device,
      "Calculate time-dependent spectrum",
      &bind_group_layout,
      &shader,
      "calculate_amplitudes",
    );

    Self {
      size: field.size(),
      cascade_count: field.cascade_count(),
      pipeline,
      bind_group,
      parameters_buffer,
    }
  }

  pub fn dispatch(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, time: f32) {
    let parameters = Parameters {
      time,
      size: self.size,
      cascade_count: self.cascade_count,
      _padding: 0,
    };
    gpu::record_buffer_write(device, encoder, &self.parameters_buffer, bytemuck::bytes_of(&parameters));

    let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
      label: Some("Calculate time-dependent spectrum"),
      timestamp_writes: None,
    });
    compute_pass.set_pipeline(&self.pipeline);
    compute_pass.set_bind_group(0, &self.bind_group, &[]);
    dispatch_grid(&mut compute_pass, self.size, self.size, self.cascade_count);
  }
}
