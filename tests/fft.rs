use ocean_fft::gpu::{self, GpuContext, Texel};
use ocean_fft::ocean::pipelines::{FftDirection, FftOptions, FftPrecomputeCache, FFT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

fn context() -> Option<GpuContext> {
  match GpuContext::new_blocking() {
    Ok(context) => Some(context),
    Err(err) => {
      eprintln!("skipping GPU test: {}", err);
      None
    }
  }
}

fn random_texels(size: u32, seed: u64) -> Vec<Texel> {
  let mut rng = StdRng::seed_from_u64(seed);
  (0..size * size)
    .map(|_| {
      [
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
      ]
    })
    .collect()
}

fn run(context: &GpuContext, fft: &FFT, texture: &wgpu::Texture, options: FftOptions) {
  let mut encoder = context
    .device
    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
      label: Some("fft test"),
    });
  fft
    .dispatch(&context.device, &mut encoder, texture, options)
    .unwrap();
  context.queue.submit(Some(encoder.finish()));
}

/// Row-major 2D DFT of one complex channel via rustfft.
fn reference_forward(data: &[Complex32], size: usize) -> Vec<Complex32> {
  let mut planner = FftPlanner::<f32>::new();
  let fft = planner.plan_fft_forward(size);

  let mut rows = data.to_vec();
  for row in rows.chunks_exact_mut(size) {
    fft.process(row);
  }

  let mut result = rows.clone();
  let mut column = vec![Complex32::new(0.0, 0.0); size];
  for x in 0..size {
    for y in 0..size {
      column[y] = rows[y * size + x];
    }
    fft.process(&mut column);
    for y in 0..size {
      result[y * size + x] = column[y];
    }
  }
  result
}

fn relative_error(actual: &[Complex32], expected: &[Complex32]) -> f32 {
  let diff: f32 = actual
    .iter()
    .zip(expected)
    .map(|(a, b)| (a - b).norm_sqr())
    .sum();
  let norm: f32 = expected.iter().map(|b| b.norm_sqr()).sum();
  (diff / norm).sqrt()
}

#[test]
fn forward_transform_matches_rustfft() {
  let Some(context) = context() else { return };
  let mut cache = FftPrecomputeCache::new();

  for size in [64u32, 128, 256, 512] {
    let fft = FFT::init(&context, &mut cache, size, 1).unwrap();
    let input = random_texels(size, size as u64);
    let texture = gpu::create_texture(&context.device, "fft input", size, 1, 1);
    context.write_texture(&texture, &input);

    run(
      &context,
      &fft,
      &texture,
      FftOptions {
        direction: FftDirection::Forward,
        scale: false,
        permute: false,
      },
    );
    let output = context.read_texture(&texture, 0, 0).unwrap();

    for channel in [0usize, 2] {
      let data: Vec<_> = input
        .iter()
        .map(|t| Complex32::new(t[channel], t[channel + 1]))
        .collect();
      let actual: Vec<_> = output
        .iter()
        .map(|t| Complex32::new(t[channel], t[channel + 1]))
        .collect();
      let expected = reference_forward(&data, size as usize);
      let error = relative_error(&actual, &expected);
      assert!(error < 2e-3, "size {} channel {}: error {}", size, channel, error);
    }
  }
}

#[test]
fn scaled_inverse_undoes_forward() {
  let Some(context) = context() else { return };
  let mut cache = FftPrecomputeCache::new();

  for size in [64u32, 128, 256, 512] {
    let fft = FFT::init(&context, &mut cache, size, 1).unwrap();
    let input = random_texels(size, 7);
    let texture = gpu::create_texture(&context.device, "fft input", size, 1, 1);
    context.write_texture(&texture, &input);

    for direction in [FftDirection::Forward, FftDirection::Inverse] {
      run(
        &context,
        &fft,
        &texture,
        FftOptions {
          direction,
          scale: direction == FftDirection::Inverse,
          permute: false,
        },
      );
    }

    let output = context.read_texture(&texture, 0, 0).unwrap();
    let max_error = input
      .iter()
      .zip(&output)
      .flat_map(|(a, b)| a.iter().zip(b).map(|(a, b)| (a - b).abs()))
      .fold(0.0f32, f32::max);
    assert!(max_error < 5e-3, "size {}: max error {}", size, max_error);
  }
}

#[test]
fn hermitian_spectrum_gives_real_field() {
  let size = 64u32;
  let n = size as usize;
  let Some(context) = context() else { return };
  let mut cache = FftPrecomputeCache::new();
  let fft = FFT::init(&context, &mut cache, size, 1).unwrap();

  // Centered spectrum: the zero frequency sits at (n/2, n/2), so (x, y) pairs with (n - x, n - y).
  let mut rng = StdRng::seed_from_u64(3);
  let mut input = vec![[0.0f32; 4]; n * n];
  for y in 1..n {
    for x in 1..n {
      let (mx, my) = (n - x, n - y);
      let index = y * n + x;
      let mirror = my * n + mx;
      if index < mirror {
        let (re, im) = (rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        input[index] = [re, im, 0.0, 0.0];
        input[mirror] = [re, -im, 0.0, 0.0];
      } else if index == mirror {
        input[index] = [rng.gen_range(-1.0..1.0), 0.0, 0.0, 0.0];
      }
    }
  }

  let texture = gpu::create_texture(&context.device, "fft input", size, 1, 1);
  context.write_texture(&texture, &input);
  run(&context, &fft, &texture, FftOptions::default());

  let output = context.read_texture(&texture, 0, 0).unwrap();
  let max_real = output.iter().map(|t| t[0].abs()).fold(0.0f32, f32::max);
  let max_imag = output.iter().map(|t| t[1].abs()).fold(0.0f32, f32::max);
  assert!(max_real > 1.0);
  assert!(max_imag < 5e-3 * max_real, "imaginary part {} vs real {}", max_imag, max_real);
}
