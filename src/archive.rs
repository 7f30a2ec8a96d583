//! Archive codec for remote metadata packages.
//!
//! The platform ships packaged artifact state as a gzip stream wrapping a
//! JSON object of `artifact name -> text`. Decoding is a pure transform over
//! the provided bytes: the stream is decompressed to completion (trailer
//! checked) before any content is parsed, so a truncated or corrupt archive
//! can never leak a partial snapshot downstream.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("archive is not a valid compressed stream: {0}")]
    Compression(#[from] std::io::Error),
    #[error("archive content is not a valid artifact map: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("archive entry {entry:?} does not hold text content")]
    NonText { entry: String },
}

/// Decode a packaged archive into its named text contents.
pub fn decode(raw: &[u8]) -> Result<BTreeMap<String, String>, CodecError> {
    let mut decoder = GzDecoder::new(raw);
    let mut payload = Vec::new();
    // Full decompression must succeed before anything is parsed.
    decoder.read_to_end(&mut payload)?;

    let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&payload)?;

    let mut snapshot = BTreeMap::new();
    for (name, value) in entries {
        match value {
            serde_json::Value::String(text) => {
                snapshot.insert(name, text);
            }
            _ => return Err(CodecError::NonText { entry: name }),
        }
    }
    Ok(snapshot)
}

/// Encode named text contents into a packaged archive, the inverse of
/// [`decode`]. Used to package the local artifact for deployment.
pub fn encode(entries: &BTreeMap<String, String>) -> Result<Vec<u8>, CodecError> {
    let payload = serde_json::to_vec(entries)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&payload)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(
            "classes/Invoice.cls".to_string(),
            "public class Invoice {}\n".to_string(),
        );
        m.insert("classes/Ledger.cls".to_string(), "// empty\n".to_string());
        m
    }

    #[test]
    fn round_trip() {
        let entries = sample();
        let raw = encode(&entries).unwrap();
        assert_eq!(decode(&raw).unwrap(), entries);
    }

    #[test]
    fn rejects_non_compressed_bytes() {
        let err = decode(b"definitely not gzip").unwrap_err();
        assert!(matches!(err, CodecError::Compression(_)));
    }

    #[test]
    fn rejects_truncated_stream() {
        let raw = encode(&sample()).unwrap();
        let err = decode(&raw[..raw.len() - 4]).unwrap_err();
        assert!(matches!(err, CodecError::Compression(_)));
    }

    #[test]
    fn rejects_non_text_entries() {
        let payload = br#"{"classes/Invoice.cls": 42}"#;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        let raw = encoder.finish().unwrap();

        let err = decode(&raw).unwrap_err();
        assert!(matches!(err, CodecError::NonText { entry } if entry == "classes/Invoice.cls"));
    }

    #[test]
    fn rejects_non_object_payload() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"[1, 2, 3]").unwrap();
        let raw = encoder.finish().unwrap();

        assert!(matches!(decode(&raw).unwrap_err(), CodecError::Malformed(_)));
    }
}
