//! Orchestrator Agent (component I): the tool-calling turn loop that decides
//! chat vs. recs and, for recs, drives the runner + curator to a final slate.

pub mod active_spec;
pub mod orchestrator;
pub mod prompts;
pub mod state;

pub use active_spec::ActiveSpec;
pub use orchestrator::{run_recs, Decision, OrchestratorAgent, OrchestratorError, RecsOutcome, RunRecsError};
pub use state::AgentState;
