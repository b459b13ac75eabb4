//! Wire record decoding
//!
//! Records arrive as JSON documents that may additionally be
//! base64-encoded and/or gzip-compressed (gzip inside base64, matching
//! the upstream transport). Compression is detected by the gzip magic
//! bytes rather than trusted from metadata.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::Read;
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors that can occur while decoding a wire record
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Empty record")]
    Empty,

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Gzip decompression error: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a raw wire record into a JSON value.
///
/// Accepts plain JSON, gzipped JSON, base64-encoded JSON, and
/// base64-encoded gzipped JSON.
pub fn decode_record(raw: &[u8]) -> Result<Value, CodecError> {
    let trimmed = trim_ascii(raw);
    if trimmed.is_empty() {
        return Err(CodecError::Empty);
    }

    // Plain JSON documents start with an object or array delimiter
    if trimmed[0] == b'{' || trimmed[0] == b'[' {
        return Ok(serde_json::from_slice(trimmed)?);
    }

    if trimmed.starts_with(&GZIP_MAGIC) {
        return Ok(serde_json::from_slice(&gunzip(trimmed)?)?);
    }

    let decoded = BASE64.decode(trimmed)?;
    let payload = if decoded.starts_with(&GZIP_MAGIC) {
        gunzip(&decoded)?
    } else {
        decoded
    };
    Ok(serde_json::from_slice(&payload)?)
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn trim_ascii(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(start);
    &data[start..end]
}
