//! Explanation agent (component J): builds the "why you might enjoy it"
//! prompt envelope for a slate and streams the model's JSONL response.

pub mod envelope;
pub mod stream;

pub use envelope::{build_why_prompt_envelope, pick_call};
pub use stream::{stream_why_events, WhyEvent, WhyItem};
