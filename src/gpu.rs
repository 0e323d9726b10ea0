//! Headless device and queue, plus the upload and readback plumbing the pipelines share.

use std::sync::atomic::{AtomicBool, Ordering};

use wgpu::util::DeviceExt;

use crate::error::{Error, Result};

/// One `Rgba32Float` texel.
pub type Texel = [f32; 4];

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const TEXEL_SIZE: u32 = std::mem::size_of::<Texel>() as u32;

pub struct GpuContext {
  pub instance: wgpu::Instance,
  pub device: wgpu::Device,
  pub queue: wgpu::Queue,
  lost: std::sync::Arc<AtomicBool>,
}

impl GpuContext {
  /// Creates a device on the first high-performance adapter. No surface is needed.
  pub async fn new() -> Result<Self> {
    let instance = wgpu::Instance::default();
    let adapter = instance
      .request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
      })
      .await
      .ok_or(Error::NoAdapter)?;

    let info = adapter.get_info();
    log::info!("Using adapter {} ({:?})", info.name, info.backend);

    let (device, queue) = adapter
      .request_device(
        &wgpu::DeviceDescriptor {
          label: Some("Ocean device"),
          required_features: wgpu::Features::empty(),
          required_limits: wgpu::Limits::default(),
        },
        None,
      )
      .await?;

    let lost = std::sync::Arc::new(AtomicBool::new(false));
    let flag = lost.clone();
    device.on_uncaptured_error(Box::new(move |error| {
      log::error!("GPU error: {}", error);
      flag.store(true, Ordering::Release);
    }));

    Ok(Self {
      instance,
      device,
      queue,
      lost,
    })
  }

  pub fn new_blocking() -> Result<Self> {
    pollster::block_on(Self::new())
  }

  /// Set once the device reports an error or the host marks it lost. Work submitted after
  /// that point is not trusted.
  pub fn is_lost(&self) -> bool {
    self.lost.load(Ordering::Acquire)
  }

  pub fn mark_lost(&self) {
    log::warn!("GPU device marked lost");
    self.lost.store(true, Ordering::Release);
  }

  /// Copies one layer of one mip level back to the CPU, waiting for the GPU.
  pub fn read_texture(&self, texture: &wgpu::Texture, layer: u32, mip_level: u32) -> Result<Vec<Texel>> {
    let width = (texture.width() >> mip_level).max(1);
    let height = (texture.height() >> mip_level).max(1);
    let bytes_per_row = padded_bytes_per_row(width);

    let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("Texture readback"),
      size: (bytes_per_row * height) as u64,
      usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
      mapped_at_creation: false,
    });

    let mut encoder = self
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture readback"),
      });
    record_layer_copy(&mut encoder, texture, layer, mip_level, &buffer);
    self.queue.submit(Some(encoder.finish()));

    let (sender, receiver) = std::sync::mpsc::channel();
    buffer
      .slice(..)
      .map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
      });
    self.device.poll(wgpu::Maintain::Wait);
    receiver.recv().unwrap_or(Err(wgpu::BufferAsyncError))?;

    let texels = {
      let data = buffer.slice(..).get_mapped_range();
      texels_from_rows(&data, width, height, bytes_per_row)
    };
    buffer.unmap();
    Ok(texels)
  }

  /// Writes mip 0 of every layer straight through the queue. The write lands before the next
  /// submitted command buffer.
  pub fn write_texture(&self, texture: &wgpu::Texture, texels: &[Texel]) {
    let size = texture.size();
    self.queue.write_texture(
      wgpu::ImageCopyTexture {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
      },
      bytemuck::cast_slice(texels),
      wgpu::ImageDataLayout {
        offset: 0,
        bytes_per_row: Some(size.width * TEXEL_SIZE),
        rows_per_image: Some(size.height),
      },
      size,
    );
  }
}

/// Zeroes every layer of every mip level through the queue.
pub fn clear_texture(queue: &wgpu::Queue, texture: &wgpu::Texture) {
  for mip_level in 0..texture.mip_level_count() {
    let width = (texture.width() >> mip_level).max(1);
    let height = (texture.height() >> mip_level).max(1);
    let layers = texture.depth_or_array_layers();
    let zeros = vec![0u8; (width * height * layers * TEXEL_SIZE) as usize];
    queue.write_texture(
      wgpu::ImageCopyTexture {
        texture,
        mip_level,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
      },
      &zeros,
      wgpu::ImageDataLayout {
        offset: 0,
        bytes_per_row: Some(width * TEXEL_SIZE),
        rows_per_image: Some(height),
      },
      wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: layers,
      },
    );
  }
}

/// Square `Rgba32Float` array texture usable as a storage target, a sampled input and a copy
/// source or destination.
pub fn create_texture(
  device: &wgpu::Device,
  label: &str,
  size: u32,
  layers: u32,
  mip_level_count: u32,
) -> wgpu::Texture {
  device.create_texture(&wgpu::TextureDescriptor {
    label: Some(label),
    size: wgpu::Extent3d {
      width: size,
      height: size,
      depth_or_array_layers: layers,
    },
    mip_level_count,
    sample_count: 1,
    dimension: wgpu::TextureDimension::D2,
    format: TEXTURE_FORMAT,
    usage: wgpu::TextureUsages::STORAGE_BINDING
      | wgpu::TextureUsages::TEXTURE_BINDING
      | wgpu::TextureUsages::COPY_SRC
      | wgpu::TextureUsages::COPY_DST,
    view_formats: &[],
  })
}

/// All layers of a single mip level.
pub fn array_view(texture: &wgpu::Texture, mip_level: u32) -> wgpu::TextureView {
  texture.create_view(&wgpu::TextureViewDescriptor {
    dimension: Some(wgpu::TextureViewDimension::D2Array),
    base_mip_level: mip_level,
    mip_level_count: Some(1),
    ..Default::default()
  })
}

pub fn create_uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
  device.create_buffer(&wgpu::BufferDescriptor {
    label: Some(label),
    size,
    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    mapped_at_creation: false,
  })
}

/// Records a buffer update into `encoder`, so it only happens if the encoder is submitted.
pub fn record_buffer_write(
  device: &wgpu::Device,
  encoder: &mut wgpu::CommandEncoder,
  target: &wgpu::Buffer,
  bytes: &[u8],
) {
  let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
    label: Some("Staging buffer"),
    contents: bytes,
    usage: wgpu::BufferUsages::COPY_SRC,
  });
  encoder.copy_buffer_to_buffer(&staging, 0, target, 0, bytes.len() as u64);
}

/// Records an upload of mip 0 of every layer of `texture`.
pub fn record_texture_write(
  device: &wgpu::Device,
  encoder: &mut wgpu::CommandEncoder,
  texture: &wgpu::Texture,
  texels: &[Texel],
) {
  let size = texture.size();
  debug_assert_eq!(
    texels.len(),
    (size.width * size.height * size.depth_or_array_layers) as usize
  );

  let bytes_per_row = padded_bytes_per_row(size.width);
  let row = (size.width * TEXEL_SIZE) as usize;
  let bytes: &[u8] = bytemuck::cast_slice(texels);
  let padded: Vec<u8>;
  let contents = if row == bytes_per_row as usize {
    bytes
  } else {
    let mut rows = vec![0u8; bytes.len() / row * bytes_per_row as usize];
    for (source, target) in bytes.chunks_exact(row).zip(rows.chunks_exact_mut(bytes_per_row as usize)) {
      target[..row].copy_from_slice(source);
    }
    padded = rows;
    &padded
  };

  let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
    label: Some("Texture upload"),
    contents,
    usage: wgpu::BufferUsages::COPY_SRC,
  });
  encoder.copy_buffer_to_texture(
    wgpu::ImageCopyBuffer {
      buffer: &staging,
      layout: wgpu::ImageDataLayout {
        offset: 0,
        bytes_per_row: Some(bytes_per_row),
        rows_per_image: Some(size.height),
      },
    },
    wgpu::ImageCopyTexture {
      texture,
      mip_level: 0,
      origin: wgpu::Origin3d::ZERO,
      aspect: wgpu::TextureAspect::All,
    },
    size,
  );
}

/// Records a copy of one layer of `texture` into a buffer laid out with
/// [`padded_bytes_per_row`] rows.
pub fn record_layer_copy(
  encoder: &mut wgpu::CommandEncoder,
  texture: &wgpu::Texture,
  layer: u32,
  mip_level: u32,
  buffer: &wgpu::Buffer,
) {
  let width = (texture.width() >> mip_level).max(1);
  let height = (texture.height() >> mip_level).max(1);
  encoder.copy_texture_to_buffer(
    wgpu::ImageCopyTexture {
      texture,
      mip_level,
      origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
      aspect: wgpu::TextureAspect::All,
    },
    wgpu::ImageCopyBuffer {
      buffer,
      layout: wgpu::ImageDataLayout {
        offset: 0,
        bytes_per_row: Some(padded_bytes_per_row(width)),
        rows_per_image: Some(height),
      },
    },
    wgpu::Extent3d {
      width,
      height,
      depth_or_array_layers: 1,
    },
  );
}

/// Row pitch of texture copies, rounded up to the copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
  let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
  (width * TEXEL_SIZE + alignment - 1) / alignment * alignment
}

/// Strips row padding from mapped readback data.
pub fn texels_from_rows(bytes: &[u8], width: u32, height: u32, bytes_per_row: u32) -> Vec<Texel> {
  let row = (width * TEXEL_SIZE) as usize;
  let mut texels = Vec::with_capacity((width * height) as usize);
  for y in 0..height as usize {
    let start = y * bytes_per_row as usize;
    texels.extend_from_slice(bytemuck::cast_slice::<u8, Texel>(&bytes[start..start + row]));
  }
  texels
}

/// Compute pipeline with a single bind group.
pub(crate) fn create_compute_pipeline(
  device: &wgpu::Device,
  label: &str,
  bind_group_layout: &wgpu::BindGroupLayout,
  module: &wgpu::ShaderModule,
  entry_point: &str,
) -> wgpu::ComputePipeline {
  let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
    label: Some(label),
    bind_group_layouts: &[bind_group_layout],
    push_constant_ranges: &[],
  });
  device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
    label: Some(label),
    layout: Some(&layout),
    module,
    entry_point,
  })
}

pub(crate) fn uniform_entry(binding: u32, has_dynamic_offset: bool) -> wgpu::BindGroupLayoutEntry {
  wgpu::BindGroupLayoutEntry {
    binding,
    visibility: wgpu::ShaderStages::COMPUTE,
    ty: wgpu::BindingType::Buffer {
      ty: wgpu::BufferBindingType::Uniform,
      has_dynamic_offset,
      min_binding_size: None,
    },
    count: None,
  }
}

pub(crate) fn storage_buffer_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
  wgpu::BindGroupLayoutEntry {
    binding,
    visibility: wgpu::ShaderStages::COMPUTE,
    ty: wgpu::BindingType::Buffer {
      ty: wgpu::BufferBindingType::Storage { read_only: true },
      has_dynamic_offset: false,
      min_binding_size: None,
    },
    count: None,
  }
}

/// Array texture read with `textureLoad`.
pub(crate) fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
  wgpu::BindGroupLayoutEntry {
    binding,
    visibility: wgpu::ShaderStages::COMPUTE,
    ty: wgpu::BindingType::Texture {
      sample_type: wgpu::TextureSampleType::Float { filterable: false },
      view_dimension: wgpu::TextureViewDimension::D2Array,
      multisampled: false,
    },
    count: None,
  }
}

pub(crate) fn storage_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
  wgpu::BindGroupLayoutEntry {
    binding,
    visibility: wgpu::ShaderStages::COMPUTE,
    ty: wgpu::BindingType::StorageTexture {
      access: wgpu::StorageTextureAccess::WriteOnly,
      format: TEXTURE_FORMAT,
      view_dimension: wgpu::TextureViewDimension::D2Array,
    },
    count: None,
  }
}

#[cfg(test)]
pub(crate) fn test_context() -> Option<GpuContext> {
  match GpuContext::new_blocking() {
    Ok(context) => Some(context),
    Err(err) => {
      eprintln!("skipping GPU test: {}", err);
      None
    }
  }
}
