mod cascade_domain;
mod collision;
mod equalizer;
mod foam;
mod ocean_parameters;
mod presets;
mod simulation;
mod spectrum;
mod wave_field;
mod wave_field_pipeline;

pub mod pipelines;
pub mod utils;

pub use cascade_domain::*;
pub use collision::{CollisionQuery, CollisionReadback};
pub use equalizer::*;
pub use foam::{FoamSimulator, FoamTrail, TrailState};
pub use ocean_parameters::*;
pub use presets::*;
pub use simulation::{OceanSimulation, OceanUniforms};
pub use spectrum::*;
pub use wave_field::WaveField;
pub use wave_field_pipeline::WaveFieldPipeline;
