use std::sync::Arc;

use num_complex::Complex32;
use ocean_fft::gpu::GpuContext;
use ocean_fft::ocean::pipelines::{FftPrecomputeCache, InitialSpectrumPipeline, SpectrumInputs};
use ocean_fft::ocean::{
  CascadeDomain, FoamParams, OceanSimulation, PresetLibrary, PresetProvider, SimulationSettings,
  SpectrumParams, WaveField, WaveFieldPipeline, WavePreset,
};
use ocean_fft::{ConfigError, Error};

fn settings() -> SimulationSettings {
  SimulationSettings {
    resolution: 64,
    cascade_count: 2,
    ..Default::default()
  }
}

fn context() -> Option<Arc<GpuContext>> {
  match GpuContext::new_blocking() {
    Ok(context) => Some(Arc::new(context)),
    Err(err) => {
      eprintln!("skipping GPU test: {}", err);
      None
    }
  }
}

fn simulation(settings: SimulationSettings) -> Option<OceanSimulation> {
  let presets = PresetLibrary::builtin().into_provider().unwrap();
  Some(OceanSimulation::new(context()?, settings, presets, None).unwrap())
}

#[test]
fn height_statistics_match_the_spectrum() {
  let Some(context) = context() else { return };
  let mut cache = FftPrecomputeCache::new();
  let settings = settings();
  let domain = CascadeDomain::from_settings(&settings);
  // Wind 5 m/s, full scale, no swell.
  let inputs = SpectrumInputs::local_only(&SpectrumParams::default(), settings.gravity, settings.depth);

  let mut measured = [0.0f64; 2];
  let mut expected = [0.0f64; 2];
  let seeds = 16;
  for seed in 0..seeds {
    let mut pipeline = WaveFieldPipeline::new(&context, &mut cache, 64, 2, seed).unwrap();
    let mut encoder = context
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("statistics"),
      });
    let variances = pipeline.dispatch_static(&context.device, &mut encoder, &domain, &inputs);
    pipeline
      .dispatch(&context.device, &mut encoder, 0.0, 1.0)
      .unwrap();
    context.queue.submit(Some(encoder.finish()));
    pipeline.set_cascade_variances(variances);

    for cascade in 0..2 {
      let heights: Vec<f64> = context
        .read_texture(pipeline.field().displacement_texture(), cascade as u32, 0)
        .unwrap()
        .iter()
        .map(|t| t[1] as f64)
        .collect();
      let mean = heights.iter().sum::<f64>() / heights.len() as f64;
      let variance = heights.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / heights.len() as f64;

      let sigma = variance.sqrt().max(1e-12);
      assert!(mean.abs() < 0.5 * sigma, "cascade {} mean {} vs sigma {}", cascade, mean, sigma);

      measured[cascade] += variance;
      expected[cascade] += pipeline.cascade_variances()[cascade] as f64;
    }
  }

  for cascade in 0..2 {
    assert!(expected[cascade] > 0.0);
    let ratio = measured[cascade] / expected[cascade];
    assert!(
      (0.6..1.6).contains(&ratio),
      "cascade {}: measured / expected variance = {}",
      cascade,
      ratio
    );
  }
}

#[test]
fn amplitudes_are_conjugate_symmetric() {
  let Some(context) = context() else { return };
  let settings = settings();
  let n = settings.resolution as usize;
  let domain = CascadeDomain::from_settings(&settings);
  let inputs = SpectrumInputs::local_only(&SpectrumParams::default(), settings.gravity, settings.depth);

  let field = WaveField::new(&context.device, settings.resolution, settings.cascade_count);
  let pipeline = InitialSpectrumPipeline::init(&context.device, &field, 11);
  let mut encoder = context
    .device
    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
      label: Some("symmetry"),
    });
  pipeline.dispatch(&context.device, &mut encoder, &domain, &inputs);
  context.queue.submit(Some(encoder.finish()));

  let time = 2.7f32;
  for cascade in 0..settings.cascade_count {
    let h0 = context.read_texture(field.h0_texture(), cascade, 0).unwrap();
    let waves = context.read_texture(field.waves_data_texture(), cascade, 0).unwrap();
    let amplitude = |x: usize, y: usize| {
      let (h0, omega) = (h0[y * n + x], waves[y * n + x][3]);
      let exponent = Complex32::from_polar(1.0, omega * time);
      Complex32::new(h0[0], h0[1]) * exponent + Complex32::new(h0[2], h0[3]) * exponent.conj()
    };

    let mut energy = 0.0f32;
    for y in 1..n {
      for x in 1..n {
        let h = amplitude(x, y);
        let mirror = amplitude(n - x, n - y);
        energy += h.norm_sqr();
        assert!((h - mirror.conj()).norm() <= 1e-5 * (1.0 + h.norm()), "({}, {})", x, y);
      }
    }
    assert!(energy > 0.0);
  }
}

#[test]
fn collision_is_zero_until_first_readback() {
  let Some(mut sim) = simulation(settings()) else { return };
  assert_eq!(sim.sample_height(10.0, -4.0), 0.0);

  sim.set_wind_force(1.0);
  sim.update(1.0);
  assert_eq!(sim.sample_height(10.0, -4.0), 0.0);

  sim.update(1.0);
  let displacement = sim.sample_displacement(10.0, -4.0);
  assert!(displacement.iter().any(|d| *d != 0.0));
  assert_eq!(sim.sample_height(10.0, -4.0), displacement[1]);
}

#[test]
fn device_loss_degrades_collision_to_zero() {
  let Some(mut sim) = simulation(settings()) else { return };
  sim.set_wind_force(1.0);
  sim.update(1.0);
  sim.update(1.0);
  assert!(sim.sample_displacement(1.0, 1.0).iter().any(|d| *d != 0.0));

  let time = sim.time();
  sim.context().mark_lost();
  sim.update(1.0);
  assert_eq!(sim.sample_height(1.0, 1.0), 0.0);
  sim.update(1.0);
  assert_eq!(sim.sample_height(1.0, 1.0), 0.0);
  assert_eq!(sim.time(), time);
}

#[test]
fn release_then_initialize_restores_the_simulation() {
  let Some(mut sim) = simulation(settings()) else { return };
  sim.update(0.016);
  sim.update(0.016);

  sim.release();
  assert!(sim.displacement_texture().is_none());
  assert!(sim.derivatives_texture().is_none());
  assert!(sim.collision_query().is_none());
  assert!(sim.cascade_variances().is_empty());

  sim.initialize().unwrap();
  sim.set_wind_force(1.0);
  sim.update(0.016);
  sim.update(0.016);
  assert!(sim.is_initialized());
  assert_eq!(sim.displacement_texture().unwrap().width(), 64);
  assert!(sim.sample_displacement(2.0, 5.0).iter().any(|d| *d != 0.0));
}

fn foam_presets() -> PresetProvider {
  let still = WavePreset {
    name: String::from("still"),
    wind_force: 0.0,
    spectrum: SpectrumParams {
      scale: 0.0,
      ..Default::default()
    },
    foam: FoamParams {
      coverage: 0.5,
      decay_rate: 1.5,
      ..Default::default()
    },
    ..Default::default()
  };
  let storm = WavePreset {
    name: String::from("storm"),
    wind_force: 10.0,
    spectrum: SpectrumParams {
      wind_speed: 20.0,
      ..Default::default()
    },
    foam: FoamParams {
      coverage: 1.0,
      density: 2.0,
      ..Default::default()
    },
    chop: 1.5,
    ..Default::default()
  };
  PresetProvider::new(vec![still, storm]).unwrap()
}

#[test]
fn foam_accumulates_in_a_storm_and_decays_on_still_water() {
  let Some(context) = context() else { return };
  let mut sim = OceanSimulation::new(context, settings(), foam_presets(), None).unwrap();
  let foam = |sim: &OceanSimulation| -> Vec<f32> {
    let texture = sim.turbulence_texture().unwrap();
    sim
      .context()
      .read_texture(texture, 0, 0)
      .unwrap()
      .iter()
      .map(|t| t[0])
      .collect()
  };

  assert!(foam(&sim).iter().all(|f| *f == 0.0));

  let dt = 0.1f32;
  sim.set_wind_force(1.0);
  for _ in 0..8 {
    sim.update(dt);
  }
  let stormy = foam(&sim);
  assert!(stormy.iter().any(|f| *f > 0.0));
  assert!(stormy.iter().all(|f| (0.0..=1.0).contains(f)));

  // Flat water has a Jacobian of 1 everywhere, under the still coverage, so nothing is injected.
  sim.set_wind_force(0.0);
  let mut expected = stormy;
  for _ in 0..5 {
    sim.update(dt);
    let retention = (-1.5 * dt).exp();
    for value in expected.iter_mut() {
      *value *= retention;
    }
    let actual = foam(&sim);
    for (i, (a, e)) in actual.iter().zip(&expected).enumerate() {
      assert!((a - e).abs() < 1e-5, "texel {}: {} vs {}", i, a, e);
    }
  }
}

#[test]
fn invalid_configuration_is_rejected() {
  let Some(context) = context() else { return };
  let presets = PresetLibrary::builtin().into_provider().unwrap();
  let result = OceanSimulation::new(
    context,
    SimulationSettings {
      resolution: 96,
      ..settings()
    },
    presets,
    None,
  );
  assert!(matches!(
    result,
    Err(Error::Config(ConfigError::UnsupportedResolution(96)))
  ));

  let Some(mut sim) = simulation(settings()) else { return };
  let result = sim.set_settings(SimulationSettings {
    readback_cascades: 3,
    ..settings()
  });
  assert!(matches!(
    result,
    Err(Error::Config(ConfigError::ReadbackCascades { requested: 3, .. }))
  ));
  assert_eq!(sim.settings().readback_cascades, settings().readback_cascades);
}

#[test]
fn swell_adds_energy() {
  let (Some(first), Some(second)) = (context(), context()) else { return };
  let local = PresetLibrary::builtin().into_provider().unwrap();
  let swell = PresetLibrary::builtin_swell().into_provider().unwrap();
  let mut with_swell = OceanSimulation::new(first, settings(), local.clone(), Some(swell)).unwrap();
  let mut without = OceanSimulation::new(second, settings(), local, None).unwrap();

  with_swell.update(0.016);
  without.update(0.016);

  let total = |sim: &OceanSimulation| sim.cascade_variances().iter().sum::<f32>();
  assert!(total(&with_swell) > total(&without));
}

#[test]
fn presets_survive_a_json_round_trip() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("presets.json");
  let library = PresetLibrary::builtin();
  library.save(&path).unwrap();

  let loaded = PresetLibrary::load(&path).unwrap();
  assert_eq!(loaded, library);
  assert_eq!(loaded.into_provider().unwrap().len(), 5);
}
