//! gzip+JSON envelope helpers shared by the session and ticket stores.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ReelixError, Result};

/// Serialize `value` to compact JSON and gzip the result.
pub fn gzip_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Reverse of [`gzip_json`]. Any decode failure (bad gzip stream or JSON
/// that no longer matches `T`) is surfaced as `ReelixError::Serialization`
/// sources are not distinguishable here, so callers map it themselves.
pub fn gunzip_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| ReelixError::Internal(format!("gzip decode failed: {e}")))?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        a: i32,
        b: String,
    }

    #[test]
    fn round_trips() {
        let sample = Sample { a: 7, b: "hi".to_string() };
        let blob = gzip_json(&sample).unwrap();
        let back: Sample = gunzip_json(&blob).unwrap();
        assert_eq!(sample, back);
    }

    #[test]
    fn rejects_garbage() {
        let err = gunzip_json::<Sample>(b"not gzip");
        assert!(err.is_err());
    }
}
