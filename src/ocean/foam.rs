use instant::Instant;

use crate::gpu::{self, GpuContext};
use crate::ocean::ocean_parameters::{FoamParams, FoamTrailClock};
use crate::ocean::pipelines::{FoamParameters, FoamPipeline, GenerateMipmapsPipeline};
use crate::ocean::utils::saturate;
use crate::ocean::wave_field::{WaveField, OUTPUT_MIP_LEVELS};

/// Wind direction (degrees) and texture scale the foam trail is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailState {
  pub direction: f32,
  pub texture_scale: f32,
}

impl TrailState {
  pub fn from_params(params: &FoamParams) -> Self {
    Self {
      direction: params.trail_direction,
      texture_scale: params.trail_size,
    }
  }
}

/// Blends between the previous and current trail state over a fixed duration.
#[derive(Debug, Clone)]
pub struct FoamTrail {
  previous: TrailState,
  current: TrailState,
  start_time: f32,
  duration: f32,
  clock: FoamTrailClock,
  epoch: Instant,
}

impl FoamTrail {
  pub fn new(initial: TrailState, clock: FoamTrailClock) -> Self {
    Self {
      previous: initial,
      current: initial,
      start_time: 0.0,
      duration: 0.0,
      clock,
      epoch: Instant::now(),
    }
  }

  pub fn set_clock(&mut self, clock: FoamTrailClock) {
    self.clock = clock;
  }

  /// Current reading of the configured clock in seconds.
  pub fn now(&self, simulation_time: f32) -> f32 {
    match self.clock {
      FoamTrailClock::WallClock => self.epoch.elapsed().as_secs_f32(),
      FoamTrailClock::SimulationTime => simulation_time,
    }
  }

  pub fn update(&mut self, target: TrailState, duration: f32, simulation_time: f32) {
    let now = self.now(simulation_time);
    self.update_at(target, duration, now);
  }

  /// Retargets once the running blend has finished. A duration `<= 0` snaps.
  pub fn update_at(&mut self, target: TrailState, duration: f32, now: f32) {
    if duration <= 0.0 {
      self.previous = target;
      self.current = target;
      self.start_time = now;
      self.duration = 0.0;
      return;
    }

    if self.blend_at(now) >= 1.0 && target != self.current {
      log::trace!("Foam trail retargeted to {:?}", target);
      self.previous = self.current;
      self.current = target;
      self.start_time = now;
      self.duration = duration;
    }
  }

  /// 0 shows `previous`, 1 shows `current`.
  pub fn blend_at(&self, now: f32) -> f32 {
    if self.duration <= 0.0 {
      return 1.0;
    }
    saturate((now - self.start_time) / self.duration)
  }

  pub fn blend(&self, simulation_time: f32) -> f32 {
    self.blend_at(self.now(simulation_time))
  }

  pub fn previous(&self) -> TrailState {
    self.previous
  }

  pub fn current(&self) -> TrailState {
    self.current
  }
}

/// Owns the turbulence texture and advances it once per frame.
pub struct FoamSimulator {
  cascade_count: u32,
  pipeline: FoamPipeline,
  mipmaps: GenerateMipmapsPipeline,
  trail: FoamTrail,
}

impl FoamSimulator {
  /// The turbulence texture starts out cleared.
  pub fn new(context: &GpuContext, field: &WaveField, params: &FoamParams, clock: FoamTrailClock) -> Self {
    let device = &context.device;
    let turbulence = gpu::create_texture(device, "Turbulence", field.size(), 1, OUTPUT_MIP_LEVELS);
    gpu::clear_texture(&context.queue, &turbulence);

    let pipeline = FoamPipeline::init(
      device,
      turbulence,
      field.displacement_texture(),
      field.derivatives_texture(),
    );
    let mipmaps = GenerateMipmapsPipeline::init(device, &[pipeline.turbulence_texture()]);

    Self {
      cascade_count: field.cascade_count(),
      pipeline,
      mipmaps,
      trail: FoamTrail::new(TrailState::from_params(params), clock),
    }
  }

  /// Clears the field. The write lands before the next submitted frame.
  pub fn reset(&mut self, queue: &wgpu::Queue) {
    log::debug!("Clearing turbulence texture");
    gpu::clear_texture(queue, self.pipeline.turbulence_texture());
  }

  pub fn dispatch(
    &mut self,
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    params: &FoamParams,
    delta_time: f32,
  ) {
    let parameters = FoamParameters::new(params, self.cascade_count, delta_time);
    self.pipeline.dispatch(device, encoder, parameters);
    self.mipmaps.dispatch(encoder);
  }

  pub fn update_trail(&mut self, params: &FoamParams, duration: f32, simulation_time: f32) {
    self
      .trail
      .update(TrailState::from_params(params), duration, simulation_time);
  }

  pub fn trail(&self) -> &FoamTrail {
    &self.trail
  }

  pub fn trail_mut(&mut self) -> &mut FoamTrail {
    &mut self.trail
  }

  pub fn turbulence_texture(&self) -> &wgpu::Texture {
    self.pipeline.turbulence_texture()
  }
}
