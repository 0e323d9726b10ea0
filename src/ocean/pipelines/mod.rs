mod fft;
mod foam_pipeline;
mod generate_mipmaps_pipeline;
mod initial_spectrum_pipeline;
mod time_dependent_spectrum_pipeline;
mod waves_data_merge_pipeline;

pub use fft::{validate_fft_size, FftDirection, FftOptions, FftPrecomputeCache, FFT};
pub use foam_pipeline::{foam_step, jacobian, FoamParameters, FoamPipeline};
pub use generate_mipmaps_pipeline::GenerateMipmapsPipeline;
pub use initial_spectrum_pipeline::{
  expected_height_variance, wave_vector, InitialSpectrumPipeline, SpectrumInputs, MIN_WAVENUMBER,
};
pub use time_dependent_spectrum_pipeline::{evolve_amplitude, TimeDependentSpectrumPipeline};
pub use waves_data_merge_pipeline::{merge_texels, WavesDataMergePipeline};
