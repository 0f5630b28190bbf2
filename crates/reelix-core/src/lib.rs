pub mod blob;
pub mod config;
pub mod error;
pub mod kv;
pub mod types;

pub use config::ReelixConfig;
pub use error::{ReelixError, Result};
pub use types::*;
