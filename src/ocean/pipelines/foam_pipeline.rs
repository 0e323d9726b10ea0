use crate::gpu;
use crate::ocean::ocean_parameters::{FoamParams, MAX_CASCADES};
use crate::ocean::utils::{dispatch_grid, saturate};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FoamParameters {
  pub coverage: f32,
  pub density: f32,
  pub sharpness: f32,
  /// Fraction of last frame's foam that survives this frame: `exp(-decay_rate·dt)`.
  pub retention: f32,
  pub delta_time: f32,
  pub cascade_count: u32,
  _padding: [u32; 2],
  pub cascade_weights: [f32; MAX_CASCADES],
}

impl FoamParameters {
  /// Persistence only shapes how foam is rendered, it plays no part in the update.
  pub fn new(params: &FoamParams, cascade_count: u32, delta_time: f32) -> Self {
    Self {
      coverage: params.coverage,
      density: params.density,
      sharpness: params.sharpness,
      retention: (-params.decay_rate * delta_time).exp(),
      delta_time,
      cascade_count,
      _padding: [0; 2],
      cascade_weights: params.cascade_weights,
    }
  }
}

/// Jacobian of the horizontal displacement map: below 1 the surface compresses, below 0 it folds.
#[inline]
pub fn jacobian(dxx: f32, dzz: f32, dxz: f32) -> f32 {
  (1.0 + dxx) * (1.0 + dzz) - dxz * dxz
}

/// New foam value from the previous value at the same texel and this frame's per-cascade
/// Jacobians.
pub fn foam_step(previous: f32, jacobians: &[f32], parameters: &FoamParameters) -> f32 {
  let injection: f32 = jacobians
    .iter()
    .zip(parameters.cascade_weights.iter())
    .map(|(j, weight)| weight * saturate((parameters.coverage - j) * parameters.sharpness))
    .sum();

  saturate(previous * parameters.retention + parameters.density * parameters.delta_time * injection)
}

/// Turbulence update: `r` holds foam, `g` the smallest Jacobian over all cascades.
pub struct FoamPipeline {
  size: u32,
  turbulence_texture: wgpu::Texture,
  previous_texture: wgpu::Texture,
  pipeline: wgpu::ComputePipeline,
  bind_group: wgpu::BindGroup,
  parameters_buffer: wgpu::Buffer,
}

impl FoamPipeline {
  /// `turbulence_texture` is owned by the pipeline from here on, its mip 0 is the foam field.
  pub fn init(
    device: &wgpu::Device,
    turbulence_texture: wgpu::Texture,
    displacement_texture: &wgpu::Texture,
    derivatives_texture: &wgpu::Texture,
  ) -> Self {
    let size = turbulence_texture.width();
    let previous_texture = gpu::create_texture(device, "Previous turbulence", size, 1, 1);

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("Foam shader"),
      source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/foam.wgsl").into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("Foam bind group layout"),
      entries: &[
        gpu::uniform_entry(0, false),
        gpu::texture_entry(1),
        gpu::texture_entry(2),
        gpu::texture_entry(3),
        gpu::storage_texture_entry(4),
      ],
    });

    let parameters_buffer = gpu::create_uniform_buffer(
      device,
      "Foam parameters",
      std::mem::size_of::<FoamParameters>() as u64,
    );

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("Foam bind group"),
      layout: &bind_group_layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: parameters_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 1,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&previous_texture, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 2,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(displacement_texture, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 3,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(derivatives_texture, 0)),
        },
        wgpu::BindGroupEntry {
          binding: 4,
          resource: wgpu::BindingResource::TextureView(&gpu::array_view(&turbulence_texture, 0)),
        },
      ],
    });

    Self {
      size,
      turbulence_texture,
      previous_texture,
      pipeline: gpu::create_compute_pipeline(device, "Foam", &bind_group_layout, &shader, "update_foam"),
      bind_group,
      parameters_buffer,
    }
  }

  pub fn turbulence_texture(&self) -> &wgpu::Texture {
    &self.turbulence_texture
  }

  pub fn dispatch(
    &self,
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    parameters: FoamParameters,
  ) {
    gpu::record_buffer_write(device, encoder, &self.parameters_buffer, bytemuck::bytes_of(&parameters));
    encoder.copy_texture_to_texture(
      self.turbulence_texture.as_image_copy(),
      self.previous_texture.as_image_copy(),
      self.previous_texture.size(),
    );

    let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
      label: Some("Foam"),
      timestamp_writes: None,
    });
    compute_pass.set_pipeline(&self.pipeline);
    compute_pass.set_bind_group(0, &self.bind_group, &[]);
    dispatch_grid(&mut compute_pass, self.size, self.size, 1);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gpu::{test_context, Texel};

  fn parameters(delta_time: f32) -> FoamParameters {
    FoamParameters::new(&FoamParams::default(), 2, delta_time)
  }

  #[test]
  fn flat_water_only_decays() {
    let p = parameters(0.1);
    let next = foam_step(0.8, &[1.0, 1.0], &p);
    assert!(next < 0.8);
    assert!((next - 0.8 * p.retention).abs() < 1e-6);
  }

  #[test]
  fn decay_follows_the_decay_rate_alone() {
    let p = FoamParameters::new(
      &FoamParams {
        decay_rate: 1.0,
        persistence: 0.9,
        ..Default::default()
      },
      2,
      0.1,
    );
    let expected = 0.8 * (-0.1f32).exp();
    assert!((foam_step(0.8, &[1.0, 1.0], &p) - expected).abs() < 1e-6);

    let other_persistence = FoamParameters::new(
      &FoamParams {
        decay_rate: 1.0,
        persistence: 0.0,
        ..Default::default()
      },
      2,
      0.1,
    );
    assert_eq!(other_persistence.retention, p.retention);
  }

  #[test]
  fn step_is_decay_plus_weighted_crest_injection() {
    let params = FoamParams {
      coverage: 0.6,
      density: 1.5,
      sharpness: 2.0,
      decay_rate: 0.7,
      cascade_weights: [1.0, 0.5, 0.25, 0.0],
      ..Default::default()
    };
    let dt = 0.05;
    let p = FoamParameters::new(&params, 3, dt);

    // Crest terms: (0.6 - 0.2)·2 = 0.8, (0.6 - 0.9)·2 clamps to 0, (0.6 + 0.4)·2 clamps to 1.
    let injection = 1.0 * 0.8 + 0.5 * 0.0 + 0.25 * 1.0;
    let expected = 0.3 * (-0.7f32 * 0.05).exp() + 1.5 * 0.05 * injection;
    assert!((foam_step(0.3, &[0.2, 0.9, -0.4], &p) - expected).abs() < 1e-6);
  }

  #[test]
  fn compressed_crests_inject_foam() {
    let p = parameters(0.1);
    assert!(foam_step(0.0, &[-0.2, 1.0], &p) > 0.0);
    assert_eq!(foam_step(0.0, &[1.0, 1.0], &p), 0.0);
  }

  #[test]
  fn foam_is_clamped() {
    let p = FoamParameters::new(
      &FoamParams {
        density: 100.0,
        ..Default::default()
      },
      2,
      1.0,
    );
    assert_eq!(foam_step(1.0, &[-5.0, -5.0], &p), 1.0);
  }

  #[test]
  fn jacobian_of_rest_state_is_one() {
    assert_eq!(jacobian(0.0, 0.0, 0.0), 1.0);
    assert!(jacobian(-0.6, -0.6, 0.3) < 0.5);
  }

  #[test]
  fn kernel_matches_cpu_foam_step() {
    let Some(context) = test_context() else { return };
    let size = 16u32;
    let texels = (size * size) as usize;
    let device = &context.device;
    let displacement = gpu::create_texture(device, "displacement", size, 2, 1);
    let derivatives = gpu::create_texture(device, "derivatives", size, 2, 1);
    let turbulence = gpu::create_texture(device, "turbulence", size, 1, 1);

    let displacement_data: Vec<Texel> = (0..2 * texels)
      .map(|i| [0.0, 0.0, 0.0, ((i * 7) % 11) as f32 * 0.05 - 0.25])
      .collect();
    let derivatives_data: Vec<Texel> = (0..2 * texels)
      .map(|i| [0.0, 0.0, ((i * 5) % 13) as f32 * -0.1, ((i * 3) % 7) as f32 * -0.1])
      .collect();
    let previous: Vec<Texel> = (0..texels).map(|i| [(i % 10) as f32 * 0.1, 0.0, 0.0, 0.0]).collect();
    context.write_texture(&displacement, &displacement_data);
    context.write_texture(&derivatives, &derivatives_data);
    context.write_texture(&turbulence, &previous);

    let parameters = parameters(0.05);
    let pipeline = FoamPipeline::init(device, turbulence, &displacement, &derivatives);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    pipeline.dispatch(device, &mut encoder, parameters);
    context.queue.submit(Some(encoder.finish()));

    let result = context.read_texture(pipeline.turbulence_texture(), 0, 0).unwrap();
    for i in 0..texels {
      let jacobians: Vec<f32> = (0..2)
        .map(|cascade| {
          let d = derivatives_data[cascade * texels + i];
          jacobian(d[2], d[3], displacement_data[cascade * texels + i][3])
        })
        .collect();
      let expected = foam_step(previous[i][0], &jacobians, &parameters);
      let min_jacobian = jacobians.iter().copied().fold(f32::MAX, f32::min);
      assert!((result[i][0] - expected).abs() < 1e-5, "texel {}", i);
      assert!((result[i][1] - min_jacobian).abs() < 1e-5, "texel {}", i);
    }
  }
}
