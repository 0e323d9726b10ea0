use crate::gpu::{self, Texel};
use crate::ocean::utils::dispatch_grid;
use crate::ocean::wave_field::WaveField;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Parameters {
  lambda: f32,
  size: u32,
  cascade_count: u32,
  _padding: u32,
}

/// Displacement and derivative texels for one cascade from its two transformed amplitude
/// texels.
pub fn merge_texels(dx_dz_dy_dxz: Texel, dyx_dyz_dxx_dzz: Texel, lambda: f32) -> [Texel; 2] {
  [
    [
      lambda * dx_dz_dy_dxz[0],
      dx_dz_dy_dxz[2],
      lambda * dx_dz_dy_dxz[1],
      lambda * dx_dz_dy_dxz[3],
    ],
    [
      dyx_dyz_dxx_dzz[0],
      dyx_dyz_dxx_dzz[1],
      lambda * dyx_dyz_dxx_dzz[2],
      lambda * dyx_dyz_dxx_dzz[3],
    ],
  ]
}

/// Unpacks the transformed amplitudes into the displacement and derivative textures,
/// applying the chop factor `lambda` to horizontal terms.
pub struct WavesDataMergePipeline {
  size: u32,
  cascade_count: u32,
  pipeline: wgpu::ComputePipeline,
  bind_group: wgpu::BindGroup,
  parameters_buffer: wgpu::Buffer,
}

impl WavesDataMergePipeline {
  pub fn init(device: &wgpu::Device, field: &WaveField) -> Self {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("Waves data merge shader"),
      source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/waves_data_merge.wgsl").into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("Waves data merge bind group layout"),
      entries: &[
        gpu::uniform_entry(0, false),
        gpu::texture_entry(1),
        gpu::storage_texture_entry(2),
        gpu::storage_texture_entry(3),
      ],
    });

    let parameters_buffer = gpu::create_uniform_buffer(
      device,
      "Waves data merge parameters",
      std::mem::size_of::<Parameters>() as u64,
    );

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("Waves data merge bind group"),
      layout: &bind_group_layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: parameters_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 1,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.amplitudes, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 2,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.displacement, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 3,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&field.derivatives, 0)),
        },
      ],
    });

    Self {
      size: field.size(),
      cascade_count: field.cascade_count(),
      pipeline: gpu::create_compute_pipeline(
        device,
        "Waves data merge",
        &bind_group_layout,
        &shader,
        "merge",
      ),
      bind_group,
      parameters_buffer,
    }
  }

  pub fn dispatch(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, lambda: f32) {
    let parameters = Parameters {
      lambda,
      size: self.size,
      cascade_count: self.cascade_count,
      _padding: 0,
    };
    gpu::record_buffer_write(device, encoder, &self.parameters_buffer, bytemuck::bytes_of(&parameters));

    let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
      label: Some("Waves data merge"),
      timestamp_writes: None,
    });
    compute_pass.set_pipeline(&self.pipeline);
    compute_pass.set_bind_group(0, &self.bind_group, &[]);
    dispatch_grid(&mut compute_pass, self.size, self.size, self.cascade_count);
  }
}
