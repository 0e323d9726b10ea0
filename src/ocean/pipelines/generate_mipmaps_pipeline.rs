use crate::gpu;
use crate::ocean::utils::dispatch_grid;

struct MipLevel {
  size: u32,
  layers: u32,
  bind_group: wgpu::BindGroup,
}

/// Rebuilds the mip chain of each texture with a 2×2 box filter.
pub struct GenerateMipmapsPipeline {
  pipeline: wgpu::ComputePipeline,
  levels: Vec<MipLevel>,
}

impl GenerateMipmapsPipeline {
  pub fn init(device: &wgpu::Device, textures: &[&wgpu::Texture]) -> Self {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("Generate mipmaps shader"),
      source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/generate_mipmaps.wgsl").into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("Generate mipmaps bind group layout"),
      entries: &[gpu::texture_entry(0), gpu::storage_texture_entry(1)],
    });

    let mut levels = Vec::new();
    for texture in textures {
      for level in 1..texture.mip_level_count() {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
          label: Some("Generate mipmaps bind group"),
          layout: &bind_group_layout,
          entries: &[
            wgpu::BindGroupEntry {
              binding: 0,
              resource: wgpu::BindingResource::TextureView(&gpu::array_view(texture, level - 1)),
            },
            wgpu::BindGroupEntry {
              binding: 1,
              resource: wgpu::BindingResource::TextureView(&gpu::array_view(texture, level)),
            },
          ],
        });
        levels.push(MipLevel {
          size: (texture.width() >> level).max(1),
          layers: texture.depth_or_array_layers(),
          bind_group,
        });
      }
    }

    Self {
      pipeline: gpu::create_compute_pipeline(
        device,
        "Generate mipmaps",
        &bind_group_layout,
        &shader,
        "generate_mipmap",
      ),
      levels,
    }
  }

  /// Levels are recorded in order, each reads the one written before it.
  pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder) {
    let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
      label: Some("Generate mipmaps"),
      timestamp_writes: None,
    });
    compute_pass.set_pipeline(&self.pipeline);

    for level in &self.levels {
      compute_pass.set_bind_group(0, &level.bind_group, &[]);
      dispatch_grid(&mut compute_pass, level.size, level.size, level.layers);
    }
  }
}
