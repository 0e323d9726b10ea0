use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use image::{GrayImage, Luma};
use instant::Instant;

use ocean_fft::gpu::GpuContext;
use ocean_fft::logging;
use ocean_fft::ocean::{OceanSimulation, PresetLibrary, SimulationSettings};

/// Headless FFT ocean simulation
#[derive(Parser, Debug)]
#[command(name = "ocean_fft")]
#[command(about = "Runs the FFT ocean simulation without a window", long_about = None)]
struct Args {
  /// Texture resolution per cascade: 64, 128, 256 or 512
  #[arg(long, default_value_t = 256)]
  resolution: u32,

  /// Number of cascades (2 to 4)
  #[arg(long, default_value_t = 3)]
  cascades: u32,

  /// Frames to simulate
  #[arg(long, default_value_t = 60)]
  frames: u32,

  /// Time step per frame (seconds)
  #[arg(long, default_value_t = 1.0 / 60.0)]
  dt: f32,

  /// Normalized wind force in [0, 1]
  #[arg(long, value_name = "0..1", default_value_t = 0.5)]
  wind_force: f32,

  /// JSON preset library; the built-in presets are used otherwise
  #[arg(long, value_name = "JSON")]
  presets: Option<PathBuf>,

  /// Add the built-in swell on top of the local sea
  #[arg(long)]
  swell: bool,

  /// Noise seed
  #[arg(long, default_value_t = 0)]
  seed: u64,

  /// Write the final cascade-0 height field as an 8-bit greyscale image
  #[arg(long, value_name = "PNG")]
  heightmap: Option<PathBuf>,

  /// Print the collision height at this point every frame
  #[arg(long, value_name = "X,Z", value_parser = parse_point)]
  sample_at: Option<(f32, f32)>,
}

fn parse_point(value: &str) -> Result<(f32, f32), String> {
  let (x, z) = value
    .split_once(',')
    .ok_or_else(|| format!("expected X,Z, got '{}'", value))?;
  let parse = |s: &str| {
    s.trim()
      .parse::<f32>()
      .map_err(|err| format!("'{}': {}", s, err))
  };
  Ok((parse(x)?, parse(z)?))
}

fn main() -> ocean_fft::Result<()> {
  logging::init();
  let args = Args::parse();

  let settings = SimulationSettings {
    resolution: args.resolution,
    cascade_count: args.cascades,
    seed: args.seed,
    ..Default::default()
  };

  let library = match &args.presets {
    Some(path) => PresetLibrary::load(path)?,
    None => PresetLibrary::builtin(),
  };
  let swell = if args.swell {
    Some(PresetLibrary::builtin_swell().into_provider()?)
  } else {
    None
  };

  let context = Arc::new(GpuContext::new_blocking()?);
  let mut simulation = OceanSimulation::new(context, settings, library.into_provider()?, swell)?;
  simulation.set_wind_force(args.wind_force);

  let start_instant = Instant::now();
  for frame in 0..args.frames {
    let frame_instant = Instant::now();
    simulation.update(args.dt);
    log::debug!(
      "Frame {} took {:.2} ms",
      frame,
      frame_instant.elapsed().as_secs_f32() * 1000.0
    );

    if let Some((x, z)) = args.sample_at {
      println!(
        "frame {:4}  t = {:7.3}  height({}, {}) = {:.4}",
        frame,
        simulation.time(),
        x,
        z,
        simulation.sample_height(x, z)
      );
    }
  }

  let elapsed = start_instant.elapsed().as_secs_f32();
  log::info!(
    "Simulated {} frames in {:.2} s ({:.2} ms/frame)",
    args.frames,
    elapsed,
    elapsed * 1000.0 / args.frames.max(1) as f32
  );

  if let Some(uniforms) = simulation.uniforms() {
    log::info!(
      "Significant wave height {:.2} m, wind {:.0}°, chop {:.2}",
      uniforms.reference_wave_height,
      uniforms.wind_direction,
      uniforms.chop
    );
  }

  if let Some(path) = &args.heightmap {
    write_heightmap(&simulation, path)?;
    log::info!("Height map written to {}", path.display());
  }

  Ok(())
}

/// Cascade-0 vertical displacement, normalized to the full grey range.
fn write_heightmap(simulation: &OceanSimulation, path: &Path) -> ocean_fft::Result<()> {
  let texture = match simulation.displacement_texture() {
    Some(texture) => texture,
    None => {
      log::warn!("No displacement texture to write");
      return Ok(());
    }
  };

  let size = texture.width();
  let heights: Vec<f32> = simulation
    .context()
    .read_texture(texture, 0, 0)?
    .iter()
    .map(|t| t[1])
    .collect();
  let (min, max) = heights
    .iter()
    .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)));
  let range = (max - min).max(f32::EPSILON);

  let image = GrayImage::from_fn(size, size, |x, y| {
    let h = heights[(y * size + x) as usize];
    Luma([((h - min) / range * 255.0).round() as u8])
  });
  image.save(path)?;
  Ok(())
}
