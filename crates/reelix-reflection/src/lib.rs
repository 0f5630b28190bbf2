//! Reflection agent (component K): a single best-effort "what to try next"
//! suggestion generated after a slate is served. Never blocks or fails a
//! turn — every error mode degrades to `None`.

pub mod agent;
pub mod prompts;

pub use agent::{ReflectionAgent, ReflectionStrategy, ReflectionSuggestion};
