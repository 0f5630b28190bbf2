pub mod pipeline;

pub use pipeline::{PipelineError, PipelineResult, RecommendationPipeline};
