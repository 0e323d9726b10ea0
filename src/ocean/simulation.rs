use std::sync::Arc;

use cgmath::{Deg, Rad, Vector2};

use crate::error::{ConfigError, Result};
use crate::gpu::GpuContext;
use crate::ocean::cascade_domain::CascadeDomain;
use crate::ocean::collision::{CollisionQuery, CollisionReadback};
use crate::ocean::foam::{FoamSimulator, TrailState};
use crate::ocean::ocean_parameters::{FoamParams, SimulationSettings, MAX_CASCADES};
use crate::ocean::pipelines::{FftPrecomputeCache, SpectrumInputs};
use crate::ocean::presets::{BlendedFrame, BlendedPreset, PresetBlender, PresetProvider};
use crate::ocean::wave_field_pipeline::WaveFieldPipeline;

/// Per-frame values a renderer binds alongside the simulation textures.
#[derive(Debug, Clone, PartialEq)]
pub struct OceanUniforms {
  pub cascade_count: u32,
  pub length_scales: [f32; MAX_CASCADES],
  pub cutoffs_low: [f32; MAX_CASCADES],
  pub cutoffs_high: [f32; MAX_CASCADES],
  /// Degrees.
  pub wind_direction: f32,
  pub wind_vector: Vector2<f32>,
  /// Significant wave height, `4·sqrt(Σ variance)` over all cascades.
  pub reference_wave_height: f32,
  pub chop: f32,
  pub time: f32,
  pub foam: FoamParams,
  pub trail_previous: TrailState,
  pub trail_current: TrailState,
  pub trail_blend: f32,
  pub equalizer_blend: f32,
  pub anisotropic_level: u32,
}

struct SimulationResources {
  wave_field: WaveFieldPipeline,
  foam: Option<FoamSimulator>,
  collision: CollisionReadback,
}

impl SimulationResources {
  fn new(
    context: &GpuContext,
    cache: &mut FftPrecomputeCache,
    settings: &SimulationSettings,
    foam: &FoamParams,
  ) -> std::result::Result<Self, ConfigError> {
    log::info!(
      "Allocating ocean resources: {}x{}, {} cascades, {} readback",
      settings.resolution,
      settings.resolution,
      settings.cascade_count,
      settings.readback_cascades
    );

    let wave_field = WaveFieldPipeline::new(
      context,
      cache,
      settings.resolution,
      settings.cascade_count,
      settings.seed,
    )?;
    let foam = settings.foam_enabled.then(|| {
      FoamSimulator::new(
        context,
        wave_field.field(),
        foam,
        settings.foam_trail_clock,
      )
    });
    let collision = CollisionReadback::new(
      &context.device,
      settings.resolution,
      settings.readback_cascades,
    );

    Ok(Self {
      wave_field,
      foam,
      collision,
    })
  }
}

/// Ties preset blending, the wave field, foam and collision readback into one per-frame update.
pub struct OceanSimulation {
  context: Arc<GpuContext>,
  settings: SimulationSettings,
  blender: PresetBlender,
  domain: CascadeDomain,
  fft_cache: FftPrecomputeCache,
  resources: Option<SimulationResources>,
  time: f32,
  frame: Option<BlendedFrame>,
  spectrum_dirty: bool,
}

impl OceanSimulation {
  pub fn new(
    context: Arc<GpuContext>,
    settings: SimulationSettings,
    local: PresetProvider,
    swell: Option<PresetProvider>,
  ) -> Result<Self> {
    settings.validate()?;

    let mut simulation = Self {
      domain: CascadeDomain::from_settings(&settings),
      context,
      settings,
      blender: PresetBlender::new(local, swell),
      fft_cache: FftPrecomputeCache::default(),
      resources: None,
      time: 0.0,
      frame: None,
      spectrum_dirty: true,
    };
    simulation.initialize()?;
    Ok(simulation)
  }

  /// Allocates every texture and buffer. A no-op when already initialized.
  pub fn initialize(&mut self) -> Result<()> {
    if self.resources.is_some() {
      return Ok(());
    }

    let foam = self.current_foam_params();
    let resources =
      SimulationResources::new(&self.context, &mut self.fft_cache, &self.settings, &foam)?;
    self.resources = Some(resources);
    self.spectrum_dirty = true;
    Ok(())
  }

  pub fn is_initialized(&self) -> bool {
    self.resources.is_some()
  }

  /// Drops all textures, readback buffers and the FFT precompute cache.
  pub fn release(&mut self) {
    if self.resources.take().is_some() {
      log::info!("Releasing ocean resources");
    }
    // Pending mappings hold their staging buffers until resolved.
    self.context.device.poll(wgpu::Maintain::Wait);
    self.fft_cache.clear();
    self.frame = None;
    self.spectrum_dirty = true;
  }

  /// Advances the simulation by `delta_time` seconds. Invalid states are logged and the frame skipped.
  pub fn update(&mut self, delta_time: f32) {
    // Completes the readbacks requested last frame.
    self.context.device.poll(wgpu::Maintain::Wait);
    if let Some(resources) = self.resources.as_ref() {
      resources.collision.resolve();
    }

    if !delta_time.is_finite() || delta_time < 0.0 {
      log::error!("Invalid delta time {}, skipping frame", delta_time);
      return;
    }

    let resources = match self.resources.as_mut() {
      Some(resources) => resources,
      None => {
        log::warn!("Ocean simulation updated before initialization");
        return;
      }
    };

    if self.context.is_lost() {
      log::debug!("Device lost, skipping frame");
      resources.collision.invalidate();
      return;
    }

    let frame = match self.blender.blend() {
      Some(frame) => frame,
      None => {
        log::error!("No presets to blend, skipping frame");
        return;
      }
    };

    let spectrum_changed = match &self.frame {
      Some(previous) => frame_differs(&frame, previous),
      None => true,
    };
    let rebuild_spectrum =
      self.spectrum_dirty || spectrum_changed || self.settings.recompute_spectrum_every_frame;

    let time = self.time + delta_time;
    let device = &self.context.device;
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
      label: Some("Ocean update"),
    });

    let variances = rebuild_spectrum.then(|| {
      log::debug!("Rebuilding initial spectrum at t = {:.3}", time);
      let inputs = SpectrumInputs::from_blend(&frame, self.settings.gravity, self.settings.depth);
      resources
        .wave_field
        .dispatch_static(device, &mut encoder, &self.domain, &inputs)
    });

    // Dropping the encoder discards every upload recorded above.
    if let Err(err) = resources
      .wave_field
      .dispatch(device, &mut encoder, time, frame.local.chop)
    {
      log::error!("Wave field update failed, skipping frame: {}", err);
      return;
    }

    if let Some(foam) = resources.foam.as_mut() {
      foam.dispatch(device, &mut encoder, &frame.local.foam, delta_time);
      // A fixed preset has nothing to blend towards.
      let trail_time = if self.blender.is_fixed() {
        0.0
      } else {
        self.settings.foam_trail_update_time
      };
      foam.update_trail(&frame.local.foam, trail_time, time);
    }

    resources.collision.request(
      &mut encoder,
      resources.wave_field.field().displacement_texture(),
      &self.domain,
    );

    self.context.queue.submit(Some(encoder.finish()));
    resources.collision.map();

    if let Some(variances) = variances {
      resources.wave_field.set_cascade_variances(variances);
    }
    self.time = time;
    self.frame = Some(frame);
    self.spectrum_dirty = false;
  }

  pub fn set_wind_force(&mut self, wind_force01: f32) {
    self.blender.set_wind_force(wind_force01);
  }

  pub fn wind_force(&self) -> f32 {
    self.blender.wind_force()
  }

  /// Applies new settings, reallocating when the texture layout changes. Invalid settings are
  /// rejected and the previous ones kept.
  pub fn set_settings(&mut self, settings: SimulationSettings) -> Result<()> {
    settings.validate()?;

    let reallocate = settings.layout_differs(&self.settings)
      || settings.readback_cascades != self.settings.readback_cascades
      || settings.foam_enabled != self.settings.foam_enabled;
    let reseed = settings.seed != self.settings.seed;

    if self.resources.is_some() {
      if reallocate {
        // The old field is dropped first so both never exist at once.
        self.resources = None;
        let foam = self.current_foam_params();
        let resources =
          SimulationResources::new(&self.context, &mut self.fft_cache, &settings, &foam)?;
        self.resources = Some(resources);
      } else if let Some(resources) = self.resources.as_mut() {
        if reseed {
          resources.wave_field.reseed(settings.seed);
        }
        if let Some(foam) = resources.foam.as_mut() {
          foam.trail_mut().set_clock(settings.foam_trail_clock);
        }
      }
    }

    self.domain = CascadeDomain::from_settings(&settings);
    self.settings = settings;
    self.spectrum_dirty = true;
    Ok(())
  }

  /// New noise realization for the next static phase.
  pub fn reseed(&mut self, seed: u64) {
    self.settings.seed = seed;
    if let Some(resources) = self.resources.as_mut() {
      resources.wave_field.reseed(seed);
    }
    self.spectrum_dirty = true;
  }

  /// Clears accumulated foam.
  pub fn reset_foam(&mut self) {
    if let Some(foam) = self.resources.as_mut().and_then(|r| r.foam.as_mut()) {
      foam.reset(&self.context.queue);
    }
  }

  /// Handle for querying the surface from other threads. `None` once released.
  pub fn collision_query(&self) -> Option<CollisionQuery> {
    self
      .resources
      .as_ref()
      .map(|r| r.collision.query(self.settings.collision_iterations))
  }

  pub fn sample_displacement(&self, x: f32, z: f32) -> [f32; 3] {
    self
      .collision_query()
      .map(|query| query.sample_displacement(x, z))
      .unwrap_or([0.0; 3])
  }

  pub fn sample_height(&self, x: f32, z: f32) -> f32 {
    self.sample_displacement(x, z)[1]
  }

  /// Renderer values for the last simulated frame.
  pub fn uniforms(&self) -> Option<OceanUniforms> {
    let frame = self.frame.as_ref()?;
    let resources = self.resources.as_ref()?;

    let wind_direction = frame.local.spectrum.wind_direction;
    let angle: Rad<f32> = Deg(wind_direction).into();
    let (sin, cos) = angle.0.sin_cos();

    let variance: f32 = resources.wave_field.cascade_variances().iter().sum();

    let (trail_previous, trail_current, trail_blend) = match &resources.foam {
      Some(foam) => (
        foam.trail().previous(),
        foam.trail().current(),
        foam.trail().blend(self.time),
      ),
      None => {
        let state = TrailState::from_params(&frame.local.foam);
        (state, state, 1.0)
      }
    };

    Some(OceanUniforms {
      cascade_count: self.domain.cascade_count,
      length_scales: self.domain.length_scales,
      cutoffs_low: self.domain.cutoffs_low,
      cutoffs_high: self.domain.cutoffs_high,
      wind_direction,
      wind_vector: Vector2::new(cos, sin),
      reference_wave_height: 4.0 * variance.max(0.0).sqrt(),
      chop: frame.local.chop,
      time: self.time,
      foam: frame.local.foam,
      trail_previous,
      trail_current,
      trail_blend,
      equalizer_blend: frame.local.t,
      anisotropic_level: self.settings.anisotropic_level,
    })
  }

  pub fn displacement_texture(&self) -> Option<&wgpu::Texture> {
    let resources = self.resources.as_ref()?;
    Some(resources.wave_field.field().displacement_texture().as_ref())
  }

  pub fn derivatives_texture(&self) -> Option<&wgpu::Texture> {
    let resources = self.resources.as_ref()?;
    Some(resources.wave_field.field().derivatives_texture().as_ref())
  }

  pub fn turbulence_texture(&self) -> Option<&wgpu::Texture> {
    let foam = self.resources.as_ref()?.foam.as_ref()?;
    Some(foam.turbulence_texture())
  }

  pub fn cascade_variances(&self) -> &[f32] {
    match &self.resources {
      Some(resources) => resources.wave_field.cascade_variances(),
      None => &[],
    }
  }

  pub fn context(&self) -> &GpuContext {
    &self.context
  }

  pub fn settings(&self) -> &SimulationSettings {
    &self.settings
  }

  pub fn domain(&self) -> &CascadeDomain {
    &self.domain
  }

  pub fn time(&self) -> f32 {
    self.time
  }

  pub fn blender(&self) -> &PresetBlender {
    &self.blender
  }

  /// Preset edits are picked up by the next `update`.
  pub fn blender_mut(&mut self) -> &mut PresetBlender {
    &mut self.blender
  }

  fn current_foam_params(&self) -> FoamParams {
    self
      .blender
      .blend()
      .map(|frame| frame.local.foam)
      .unwrap_or_default()
  }
}

fn frame_differs(frame: &BlendedFrame, previous: &BlendedFrame) -> bool {
  let swell_differs = |a: &Option<BlendedPreset>, b: &Option<BlendedPreset>| match (a, b) {
    (Some(a), Some(b)) => a.spectrum_differs(b),
    (None, None) => false,
    _ => true,
  };
  frame.local.spectrum_differs(&previous.local) || swell_differs(&frame.swell, &previous.swell)
}
