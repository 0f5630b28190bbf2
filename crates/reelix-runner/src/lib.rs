pub mod runner;

pub use runner::{CtxLog, RecommendationRunner, RunnerError, RunnerOutput};
