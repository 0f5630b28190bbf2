pub mod diversification;
pub mod metadata;
pub mod rrf;

pub use diversification::{diversify_by_collection, PrunedEntry};
pub use metadata::{metadata_rerank, NormAnchors};
pub use rrf::rrf;
