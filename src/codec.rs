// Binary payload codecs and content digests.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("gzip stream is truncated")]
    Truncated,
    #[error("gzip stream is corrupt: {0}")]
    Corrupt(io::Error),
    #[error("cannot compress payload: {0}")]
    Compress(io::Error),
    #[error("cannot serialize spec: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Compresses `content` into a gzip stream.
pub fn gzip(content: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).map_err(CodecError::Compress)?;
    encoder.finish().map_err(CodecError::Compress)
}

/// Decompresses a gzip stream. An empty input means the payload is absent and
/// yields an empty vector; anything else must be a complete, valid stream.
pub fn gunzip(compressed: &[u8]) -> Result<Vec<u8>, CodecError> {
    if compressed.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut out)
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::Truncated,
            _ => CodecError::Corrupt(e),
        })?;
    Ok(out)
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-1 is used only where Grafana caps identifiers at 40 hex characters.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Serializes `spec` to JSON with object keys sorted at every level.
pub fn canonical_json<T: Serialize>(spec: &T) -> Result<String, CodecError> {
    let value = serde_json::to_value(spec)?;
    Ok(serde_json::to_string(&sort_keys(value))?)
}

/// SHA-256 of the canonical JSON form; two specs are equal iff their digests are.
pub fn spec_digest<T: Serialize>(spec: &T) -> Result<String, CodecError> {
    Ok(sha256_hex(canonical_json(spec)?.as_bytes()))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = JsonMap::new();
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Carries binary fields as standard base64 strings, the way Kubernetes encodes `[]byte`.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
