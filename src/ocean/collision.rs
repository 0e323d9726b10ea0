use std::sync::{Arc, Mutex, PoisonError};

use crate::gpu::{self, Texel};
use crate::ocean::cascade_domain::CascadeDomain;

/// Latest CPU copy of one cascade's displacement.
#[derive(Debug, Default)]
struct CascadeSample {
  texels: Vec<Texel>,
  size: u32,
  length_scale: f32,
  valid: bool,
}

impl CascadeSample {
  /// Bilinear lookup with the texel grid anchored at world origin, repeating every `length_scale`.
  fn sample(&self, x: f32, z: f32) -> [f32; 3] {
    let n = self.size as f32;
    let u = (x / self.length_scale * n).rem_euclid(n);
    let v = (z / self.length_scale * n).rem_euclid(n);

    let (x0, z0) = (u.floor(), v.floor());
    let (fx, fz) = (u - x0, v - z0);
    let size = self.size as usize;
    let (x0, z0) = (x0 as usize % size, z0 as usize % size);
    let (x1, z1) = ((x0 + 1) % size, (z0 + 1) % size);

    let at = |x: usize, z: usize| self.texels[z * size + x];
    let (a, b, c, d) = (at(x0, z0), at(x1, z0), at(x0, z1), at(x1, z1));

    let mut result = [0.0; 3];
    for (i, value) in result.iter_mut().enumerate() {
      let top = a[i] + (b[i] - a[i]) * fx;
      let bottom = c[i] + (d[i] - c[i]) * fx;
      *value = top + (bottom - top) * fz;
    }
    result
  }
}

type Slot = Arc<Mutex<CascadeSample>>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where a staging buffer is in its copy, map, read cycle.
#[derive(Debug)]
enum MapState {
  Idle,
  Copied,
  Pending,
  Ready(Result<(), wgpu::BufferAsyncError>),
}

struct StagingBuffer {
  buffer: Arc<wgpu::Buffer>,
  state: Arc<Mutex<MapState>>,
  length_scale: f32,
}

/// Publishes a finished mapping into a slot. A failed mapping leaves the cascade stale.
fn complete_mapping(
  slot: &Slot,
  cascade: usize,
  result: Result<Vec<Texel>, wgpu::BufferAsyncError>,
  length_scale: f32,
) {
  let mut sample = lock(slot);
  match result {
    Ok(texels) => {
      sample.texels = texels;
      sample.length_scale = length_scale;
      sample.valid = true;
    }
    Err(err) => {
      log::warn!("Collision readback of cascade {} failed: {}", cascade, err);
      sample.valid = false;
    }
  }
}

/// Staging buffers and CPU copies for the cascades used by collision queries.
pub struct CollisionReadback {
  size: u32,
  buffers: Vec<StagingBuffer>,
  slots: Vec<Slot>,
}

impl CollisionReadback {
  pub fn new(device: &wgpu::Device, size: u32, readback_cascades: u32) -> Self {
    log::debug!("Creating {} collision readback buffer(s)", readback_cascades);
    let buffers = (0..readback_cascades)
      .map(|cascade| StagingBuffer {
        buffer: Arc::new(device.create_buffer(&wgpu::BufferDescriptor {
          label: Some(&format!("Collision readback {}", cascade)),
          size: (gpu::padded_bytes_per_row(size) * size) as u64,
          usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
          mapped_at_creation: false,
        })),
        state: Arc::new(Mutex::new(MapState::Idle)),
        length_scale: 0.0,
      })
      .collect();
    let slots = (0..readback_cascades)
      .map(|_| {
        Arc::new(Mutex::new(CascadeSample {
          size,
          ..Default::default()
        }))
      })
      .collect();

    Self { size, buffers, slots }
  }

  pub fn cascade_count(&self) -> usize {
    self.buffers.len()
  }

  /// Records the copy of each readback cascade's displacement into its staging buffer. Buffers
  /// still waiting on an earlier mapping are skipped.
  pub fn request(
    &mut self,
    encoder: &mut wgpu::CommandEncoder,
    displacement: &wgpu::Texture,
    domain: &CascadeDomain,
  ) {
    for (cascade, staging) in self.buffers.iter_mut().enumerate() {
      let mut state = lock(&staging.state);
      if !matches!(*state, MapState::Idle) {
        continue;
      }
      gpu::record_layer_copy(encoder, displacement, cascade as u32, 0, &staging.buffer);
      staging.length_scale = domain.length_scales[cascade];
      *state = MapState::Copied;
    }
  }

  /// Maps the buffers copied into this frame. Call after the copies are submitted; mappings
  /// complete on a later device poll.
  pub fn map(&self) {
    for staging in &self.buffers {
      {
        let mut state = lock(&staging.state);
        if !matches!(*state, MapState::Copied) {
          continue;
        }
        *state = MapState::Pending;
      }

      let shared = staging.state.clone();
      staging
        .buffer
        .slice(..)
        .map_async(wgpu::MapMode::Read, move |result| {
          *lock(&shared) = MapState::Ready(result);
        });
    }
  }

  /// Copies every finished mapping into its slot. Call after polling the device.
  pub fn resolve(&self) {
    for (cascade, (staging, slot)) in self.buffers.iter().zip(&self.slots).enumerate() {
      let mut state = lock(&staging.state);
      let result = match std::mem::replace(&mut *state, MapState::Idle) {
        MapState::Ready(Ok(())) => {
          let texels = {
            let data = staging.buffer.slice(..).get_mapped_range();
            gpu::texels_from_rows(&data, self.size, self.size, gpu::padded_bytes_per_row(self.size))
          };
          staging.buffer.unmap();
          Ok(texels)
        }
        MapState::Ready(Err(err)) => Err(err),
        other => {
          *state = other;
          continue;
        }
      };
      complete_mapping(slot, cascade, result, staging.length_scale);
    }
  }

  /// Marks every cascade stale; queries return 0 until the next readback completes.
  pub fn invalidate(&self) {
    for slot in &self.slots {
      lock(slot).valid = false;
    }
  }

  pub fn is_valid(&self) -> bool {
    !self.slots.is_empty() && self.slots.iter().all(|slot| lock(slot).valid)
  }

  pub fn query(&self, iterations: u32) -> CollisionQuery {
    CollisionQuery {
      slots: self.slots.clone(),
      iterations,
    }
  }

  #[cfg(test)]
  pub(crate) fn store(&self, cascade: usize, texels: Vec<Texel>, length_scale: f32) {
    complete_mapping(&self.slots[cascade], cascade, Ok(texels), length_scale);
  }
}

/// Cheap handle answering height queries from the latest completed readback.
#[derive(Clone)]
pub struct CollisionQuery {
  slots: Vec<Slot>,
  iterations: u32,
}

impl CollisionQuery {
  pub fn iterations(&self) -> u32 {
    self.iterations
  }

  /// Displacement of the surface point that ends up above `(x, z)`. Zero until data is available.
  pub fn sample_displacement(&self, x: f32, z: f32) -> [f32; 3] {
    let samples: Vec<_> = self.slots.iter().map(|slot| lock(slot)).collect();
    if samples.is_empty() || samples.iter().any(|sample| !sample.valid) {
      return [0.0; 3];
    }

    let mut displacement = [0.0f32; 3];
    for _ in 0..self.iterations {
      let (px, pz) = (x - displacement[0], z - displacement[2]);
      let mut next = [0.0f32; 3];
      for sample in &samples {
        let d = sample.sample(px, pz);
        next[0] += d[0];
        next[1] += d[1];
        next[2] += d[2];
      }
      displacement = next;
    }
    displacement
  }

  pub fn sample_height(&self, x: f32, z: f32) -> f32 {
    self.sample_displacement(x, z)[1]
  }
}
