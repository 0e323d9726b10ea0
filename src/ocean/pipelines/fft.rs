use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::Arc;

use num_complex::Complex32;
use wgpu::util::DeviceExt;

use crate::error::ConfigError;
use crate::gpu::{self, GpuContext, Texel};
use crate::ocean::ocean_parameters::MIN_FFT_SIZE;
use crate::ocean::utils::dispatch_grid;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct Parameters {
  step: u32,
  size: u32,
  inverse: u32,
  horizontal: u32,
  scale: f32,
  permute: u32,
  log_size: u32,
  _padding: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftDirection {
  Forward,
  Inverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FftOptions {
  pub direction: FftDirection,
  /// Divide by `size²`.
  pub scale: bool,
  /// Multiply by `(-1)^(x+y)`, moving the zero frequency from the grid centre to the origin.
  pub permute: bool,
}

impl Default for FftOptions {
  fn default() -> Self {
    Self {
      direction: FftDirection::Inverse,
      scale: false,
      permute: true,
    }
  }
}

pub fn validate_fft_size(size: u32) -> Result<(), ConfigError> {
  if size < MIN_FFT_SIZE || !size.is_power_of_two() {
    return Err(ConfigError::InvalidFftSize(size));
  }
  Ok(())
}

/// Twiddle factor and the two input indices of one Stockham butterfly, as the precompute
/// kernel writes them.
pub(crate) fn twiddle_factor_and_input_indices(size: u32, step: u32, index: u32) -> Texel {
  let half = size / 2;
  let b = size >> (step + 1);
  let y_half = index % half;
  let i = (2 * b * (y_half / b) + y_half % b) % size;

  let angle = -2.0 * PI * ((y_half / b) * b) as f32 / size as f32;
  let mut twiddle = Complex32::from_polar(1.0, angle);
  if index >= half {
    twiddle = -twiddle;
  }

  [twiddle.re, twiddle.im, i as f32, (i + b) as f32]
}

fn create_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
  device.create_shader_module(wgpu::ShaderModuleDescriptor {
    label: Some("FFT shader"),
    source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/fft.wgsl").into()),
  })
}

/// Precomputed butterfly data per FFT size: a `log2(size) × size` texture.
#[derive(Default)]
pub struct FftPrecomputeCache {
  textures: HashMap<u32, Arc<wgpu::Texture>>,
}

impl FftPrecomputeCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get_or_create(
    &mut self,
    context: &GpuContext,
    size: u32,
  ) -> Result<Arc<wgpu::Texture>, ConfigError> {
    if let Some(texture) = self.textures.get(&size) {
      return Ok(texture.clone());
    }
    validate_fft_size(size)?;

    log::debug!("Precomputing FFT butterflies for size {}", size);
    let device = &context.device;
    let log_size = size.trailing_zeros();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
      label: Some("FFT precompute buffer"),
      size: wgpu::Extent3d {
        width: log_size,
        height: size,
        depth_or_array_layers: 1,
      },
      mip_level_count: 1,
      sample_count: 1,
      dimension: wgpu::TextureDimension::D2,
      format: gpu::TEXTURE_FORMAT,
      usage: wgpu::TextureUsages::STORAGE_BINDING
        | wgpu::TextureUsages::TEXTURE_BINDING
        | wgpu::TextureUsages::COPY_SRC,
      view_formats: &[],
    });

    let shader = create_shader(device);
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("FFT precompute bind group layout"),
      entries: &[gpu::uniform_entry(0, false), gpu::storage_texture_entry(3)],
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("FFT precompute pipeline layout"),
      bind_group_layouts: &[&bind_group_layout],
      push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
      label: Some("FFT - Calculate twiddle factors and input indices"),
      layout: Some(&pipeline_layout),
      module: &shader,
      entry_point: "calculate_twiddle_factors_and_input_indices",
    });

    let parameters_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("FFT precompute parameters"),
      contents: bytemuck::bytes_of(&Parameters {
        size,
        log_size,
        ..Default::default()
      }),
      usage: wgpu::BufferUsages::UNIFORM,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("FFT precompute bind group"),
      layout: &bind_group_layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: parameters_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 3,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&texture, 0)),
        },
      ],
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
      label: Some("FFT precompute"),
    });
    {
      let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("FFT precompute"),
        timestamp_writes: None,
      });
      compute_pass.set_pipeline(&pipeline);
      compute_pass.set_bind_group(0, &bind_group, &[]);
      dispatch_grid(&mut compute_pass, log_size, size, 1);
    }
    context.queue.submit(Some(encoder.finish()));

    let texture = Arc::new(texture);
    self.textures.insert(size, texture.clone());
    Ok(texture)
  }

  pub fn len(&self) -> usize {
    self.textures.len()
  }

  pub fn is_empty(&self) -> bool {
    self.textures.is_empty()
  }

  pub fn clear(&mut self) {
    log::debug!("Releasing {} FFT precompute textures", self.textures.len());
    self.textures.clear();
  }
}

/// 2D FFT over every layer of a square texture, two complex values per texel (`rg`, `ba`).
pub struct FFT {
  size: u32,
  layers: u32,
  buffer: wgpu::Texture,
  precompute_data_texture: Arc<wgpu::Texture>,

  bind_group_layout: wgpu::BindGroupLayout,
  butterfly_pipeline: wgpu::ComputePipeline,
  permute_pipeline: wgpu::ComputePipeline,

  parameters_buffer: wgpu::Buffer,
  parameters_stride: u32,
}

impl FFT {
  pub fn init(
    context: &GpuContext,
    cache: &mut FftPrecomputeCache,
    size: u32,
    layers: u32,
  ) -> Result<Self, ConfigError> {
    validate_fft_size(size)?;
    let precompute_data_texture = cache.get_or_create(context, size)?;
    let device = &context.device;

    let shader = create_shader(device);
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("FFT bind group layout"),
      entries: &[
        gpu::uniform_entry(0, true),
        gpu::texture_entry(1),
        gpu::texture_entry(2),
        gpu::storage_texture_entry(3),
      ],
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("FFT pipeline layout"),
      bind_group_layouts: &[&bind_group_layout],
      push_constant_ranges: &[],
    });

    let butterfly_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
      label: Some("FFT - Butterfly step"),
      layout: Some(&pipeline_layout),
      module: &shader,
      entry_point: "butterfly_step",
    });
    let permute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
      label: Some("FFT - Permute and scale"),
      layout: Some(&pipeline_layout),
      module: &shader,
      entry_point: "permute_and_scale",
    });

    // Every parameter set a dispatch can need, one per dynamic offset.
    let log_size = size.trailing_zeros();
    let parameters_stride = device
      .limits()
      .min_uniform_buffer_offset_alignment
      .max(std::mem::size_of::<Parameters>() as u32);
    let mut entries = Vec::new();
    for inverse in [0, 1] {
      for horizontal in [1, 0] {
        for step in 0..log_size {
          entries.push(Parameters {
            step,
            size,
            inverse,
            horizontal,
            scale: 1.0,
            log_size,
            ..Default::default()
          });
        }
      }
    }
    for scale in [false, true] {
      for permute in [0, 1] {
        entries.push(Parameters {
          size,
          scale: if scale { 1.0 / (size * size) as f32 } else { 1.0 },
          permute,
          log_size,
          ..Default::default()
        });
      }
    }

    let mut contents = vec![0u8; entries.len() * parameters_stride as usize];
    for (entry, chunk) in entries.iter().zip(contents.chunks_exact_mut(parameters_stride as usize)) {
      let bytes = bytemuck::bytes_of(entry);
      chunk[..bytes.len()].copy_from_slice(bytes);
    }
    let parameters_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("FFT parameters buffer"),
      contents: &contents,
      usage: wgpu::BufferUsages::UNIFORM,
    });

    let buffer = gpu::create_texture(device, "FFT Buffer", size, layers, 1);

    Ok(Self {
      size,
      layers,
      buffer,
      precompute_data_texture,
      bind_group_layout,
      butterfly_pipeline,
      permute_pipeline,
      parameters_buffer,
      parameters_stride,
    })
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  fn log_size(&self) -> u32 {
    self.size.trailing_zeros()
  }

  fn butterfly_offset(&self, inverse: bool, horizontal: bool, step: u32) -> u32 {
    let index = (inverse as u32 * 2 + (!horizontal) as u32) * self.log_size() + step;
    index * self.parameters_stride
  }

  fn permute_offset(&self, scale: bool, permute: bool) -> u32 {
    let index = 4 * self.log_size() + scale as u32 * 2 + permute as u32;
    index * self.parameters_stride
  }

  fn bind_group(&self, device: &wgpu::Device, source: &wgpu::Texture, destination: &wgpu::Texture) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("FFT bind group"),
      layout: &self.bind_group_layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.parameters_buffer,
            offset: 0,
            size: wgpu::BufferSize::new(std::mem::size_of::<Parameters>() as u64),
          }),
        },
        wgpu::BindGroupEntry {
          binding: 1,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&self.precompute_data_texture, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 2,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(source, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 3,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(destination, 0)),
        },
      ],
    })
  }

  /// Records the transform of `texture` in place. Nothing is recorded if `texture` does not
  /// match the size and layer count the FFT was built for.
  pub fn dispatch(
    &self,
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    texture: &wgpu::Texture,
    options: FftOptions,
  ) -> Result<(), ConfigError> {
    let expected = self.buffer.size();
    let found = texture.size();
    if found != expected || texture.mip_level_count() != 1 {
      log::error!("FFT: input does not match the FFT buffer, transform skipped");
      return Err(ConfigError::ExtentMismatch {
        label: "FFT input".to_string(),
        expected: [expected.width, expected.height, expected.depth_or_array_layers],
        found: [found.width, found.height, found.depth_or_array_layers],
      });
    }

    let forward = self.bind_group(device, texture, &self.buffer);
    let backward = self.bind_group(device, &self.buffer, texture);
    let inverse = options.direction == FftDirection::Inverse;
    let mut ping_pong = 0u32;

    {
      let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("FFT"),
        timestamp_writes: None,
      });
      compute_pass.set_pipeline(&self.butterfly_pipeline);

      for horizontal in [true, false] {
        for step in 0..self.log_size() {
          let bind_group = if ping_pong == 0 { &forward } else { &backward };
          compute_pass.set_bind_group(0, bind_group, &[self.butterfly_offset(inverse, horizontal, step)]);
          dispatch_grid(&mut compute_pass, self.size, self.size, self.layers);
          ping_pong = 1 - ping_pong;
        }
      }
    }

    // 2·log2(size) steps always land back in `texture`.
    debug_assert_eq!(ping_pong, 0);

    if options.scale || options.permute {
      encoder.copy_texture_to_texture(
        texture.as_image_copy(),
        self.buffer.as_image_copy(),
        expected,
      );

      let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("FFT - Permute"),
        timestamp_writes: None,
      });
      compute_pass.set_pipeline(&self.permute_pipeline);
      compute_pass.set_bind_group(0, &backward, &[self.permute_offset(options.scale, options.permute)]);
      dispatch_grid(&mut compute_pass, self.size, self.size, self.layers);
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gpu::test_context;

  #[test]
  fn rejects_unsupported_sizes() {
    for size in [0, 4, 48, 100] {
      assert_eq!(validate_fft_size(size), Err(ConfigError::InvalidFftSize(size)));
    }
    assert!(validate_fft_size(64).is_ok());
  }

  #[test]
  fn butterflies_pair_each_index_once_per_step() {
    let size = 16;
    for step in 0..4 {
      let mut seen = vec![0; size as usize];
      for index in 0..size / 2 {
        let [re, im, a, b] = twiddle_factor_and_input_indices(size, step, index);
        assert!(((re * re + im * im) - 1.0).abs() < 1e-6);
        seen[a as usize] += 1;
        seen[b as usize] += 1;
      }
      assert!(seen.iter().all(|count| *count == 1), "step {}: {:?}", step, seen);
    }
  }

  #[test]
  fn precompute_kernel_matches_twiddle_table() {
    let Some(context) = test_context() else { return };
    let mut cache = FftPrecomputeCache::new();
    let size = 64;
    let texture = cache.get_or_create(&context, size).unwrap();

    let texels = context.read_texture(&texture, 0, 0).unwrap();
    let log_size = size.trailing_zeros();
    for index in 0..size {
      for step in 0..log_size {
        let expected = twiddle_factor_and_input_indices(size, step, index);
        let actual = texels[(index * log_size + step) as usize];
        for c in 0..4 {
          assert!((actual[c] - expected[c]).abs() < 1e-5, "step {} index {}", step, index);
        }
      }
    }
  }

  #[test]
  fn precompute_is_cached_per_size() {
    let Some(context) = test_context() else { return };
    let mut cache = FftPrecomputeCache::new();
    let a = FFT::init(&context, &mut cache, 64, 2).unwrap();
    let b = FFT::init(&context, &mut cache, 64, 4).unwrap();
    assert!(Arc::ptr_eq(&a.precompute_data_texture, &b.precompute_data_texture));

    FFT::init(&context, &mut cache, 128, 1).unwrap();
    assert_eq!(cache.len(), 2);

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(Arc::strong_count(&a.precompute_data_texture), 2);
  }

  #[test]
  fn mismatched_texture_is_left_untouched() {
    let Some(context) = test_context() else { return };
    let mut cache = FftPrecomputeCache::new();
    let fft = FFT::init(&context, &mut cache, 16, 1).unwrap();
    let wrong = gpu::create_texture(&context.device, "wrong", 32, 1, 1);
    let texels = vec![[1.0, 2.0, 3.0, 4.0]; 32 * 32];
    context.write_texture(&wrong, &texels);

    let mut encoder = context
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    let result = fft.dispatch(&context.device, &mut encoder, &wrong, FftOptions::default());
    assert!(matches!(
      result,
      Err(ConfigError::ExtentMismatch {
        expected: [16, 16, 1],
        found: [32, 32, 1],
        ..
      })
    ));
    context.queue.submit(Some(encoder.finish()));
    assert_eq!(context.read_texture(&wrong, 0, 0).unwrap(), texels);
  }

  #[test]
  fn impulse_at_centre_becomes_checkerboard_free_constant() {
    let Some(context) = test_context() else { return };
    let size = 16;
    let mut cache = FftPrecomputeCache::new();
    let fft = FFT::init(&context, &mut cache, size, 1).unwrap();
    let texture = gpu::create_texture(&context.device, "impulse", size, 1, 1);
    let mut texels = vec![[0.0; 4]; (size * size) as usize];
    texels[(size / 2 * size + size / 2) as usize] = [1.0, 0.0, 0.0, 2.0];
    context.write_texture(&texture, &texels);

    let mut encoder = context
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    fft.dispatch(&context.device, &mut encoder, &texture, FftOptions::default()).unwrap();
    context.queue.submit(Some(encoder.finish()));

    // A centred impulse is the zero frequency: after permutation the field is flat.
    for texel in context.read_texture(&texture, 0, 0).unwrap() {
      assert!((texel[0] - 1.0).abs() < 1e-5);
      assert!(texel[1].abs() < 1e-5);
      assert!(texel[2].abs() < 1e-5);
      assert!((texel[3] - 2.0).abs() < 1e-5);
    }
  }
}
