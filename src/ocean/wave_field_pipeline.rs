use crate::error::ConfigError;
use crate::gpu::GpuContext;
use crate::ocean::cascade_domain::CascadeDomain;
use crate::ocean::pipelines::{
  expected_height_variance, FftOptions, FftPrecomputeCache, GenerateMipmapsPipeline,
  InitialSpectrumPipeline, SpectrumInputs, TimeDependentSpectrumPipeline, WavesDataMergePipeline,
  FFT,
};
use crate::ocean::wave_field::WaveField;

/// Static phase, time evolution, FFT and merge for one wave field configuration.
pub struct WaveFieldPipeline {
  field: WaveField,
  cascade_variances: Vec<f32>,

  // pipelines
  initial_spectrum_pipeline: InitialSpectrumPipeline,
  time_dependent_spectrum_pipeline: TimeDependentSpectrumPipeline,
  fft: FFT,
  waves_data_merge_pipeline: WavesDataMergePipeline,
  generate_mipmaps_pipeline: GenerateMipmapsPipeline,
}

impl WaveFieldPipeline {
  pub fn new(
    context: &GpuContext,
    cache: &mut FftPrecomputeCache,
    size: u32,
    cascade_count: u32,
    seed: u64,
  ) -> Result<Self, ConfigError> {
    let fft = FFT::init(context, cache, size, cascade_count * 2)?;

    let device = &context.device;
    let field = WaveField::new(device, size, cascade_count);
    let initial_spectrum_pipeline = InitialSpectrumPipeline::init(device, &field, seed);
    let time_dependent_spectrum_pipeline = TimeDependentSpectrumPipeline::init(device, &field);
    let waves_data_merge_pipeline = WavesDataMergePipeline::init(device, &field);
    let generate_mipmaps_pipeline =
      GenerateMipmapsPipeline::init(device, &[&field.displacement, &field.derivatives]);

    Ok(Self {
      field,
      cascade_variances: vec![0.0; cascade_count as usize],
      initial_spectrum_pipeline,
      time_dependent_spectrum_pipeline,
      fft,
      waves_data_merge_pipeline,
      generate_mipmaps_pipeline,
    })
  }

  pub fn field(&self) -> &WaveField {
    &self.field
  }

  pub fn reseed(&mut self, seed: u64) {
    self.initial_spectrum_pipeline.reseed(seed);
  }

  /// Records the rebuild of `H0` and the per-wave data, and returns the height variance each
  /// cascade will have once the encoder is submitted. Commit it with
  /// [`set_cascade_variances`](Self::set_cascade_variances) after submission.
  #[must_use]
  pub fn dispatch_static(
    &self,
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    domain: &CascadeDomain,
    inputs: &SpectrumInputs,
  ) -> Vec<f32> {
    self
      .initial_spectrum_pipeline
      .dispatch(device, encoder, domain, inputs);

    let size = self.field.size();
    (0..self.field.cascade_count() as usize)
      .map(|cascade| expected_height_variance(size, domain, inputs, cascade))
      .collect()
  }

  pub fn set_cascade_variances(&mut self, variances: Vec<f32>) {
    self.cascade_variances = variances;
  }

  /// Evolves to `time`, transforms, and writes displacement and derivatives with their mips.
  pub fn dispatch(
    &self,
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    time: f32,
    lambda: f32,
  ) -> Result<(), ConfigError> {
    self
      .time_dependent_spectrum_pipeline
      .dispatch(device, encoder, time);
    self
      .fft
      .dispatch(device, encoder, &self.field.amplitudes, FftOptions::default())?;
    self
      .waves_data_merge_pipeline
      .dispatch(device, encoder, lambda);
    self.generate_mipmaps_pipeline.dispatch(encoder);
    Ok(())
  }

  /// Expected height variance of each cascade from the last submitted static phase.
  pub fn cascade_variances(&self) -> &[f32] {
    &self.cascade_variances
  }

  /// Swaps the transform, letting tests drive the failure path of [`dispatch`](Self::dispatch).
  #[cfg(test)]
  pub(crate) fn replace_fft(&mut self, fft: FFT) {
    self.fft = fft;
  }
}
