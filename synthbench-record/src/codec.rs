//! Transport Encoding
//!
//! ```text
//! TestResult --rkyv--> bytes --base64--> one ASCII line
//! ```
//!
//! Decoding validates the archive before touching it, so a truncated or foreign
//! line is an error rather than undefined behaviour.

use crate::TestResult;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rkyv::{AlignedVec, Deserialize, Infallible};
use thiserror::Error;

/// Errors while encoding or decoding result lines
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Record on line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<RecordError>,
    },
}

/// Encode a result as a single base64 line (no trailing newline)
pub fn encode_result(result: &TestResult) -> Result<String, RecordError> {
    let bytes =
        rkyv::to_bytes::<_, 256>(result).map_err(|e| RecordError::Serialization(e.to_string()))?;
    Ok(BASE64.encode(&bytes))
}

/// Decode one line produced by [`encode_result`]; surrounding whitespace is ignored.
pub fn decode_result(line: &str) -> Result<TestResult, RecordError> {
    let bytes = BASE64.decode(line.trim())?;

    // Archived data must be read from an aligned buffer
    let mut buf = AlignedVec::with_capacity(bytes.len());
    buf.extend_from_slice(&bytes);

    let archived = rkyv::check_archived_root::<TestResult>(&buf)
        .map_err(|e| RecordError::Deserialization(e.to_string()))?;

    archived
        .deserialize(&mut Infallible)
        .map_err(|e| RecordError::Deserialization(format!("{:?}", e)))
}

/// Decode every non-empty line of a result file
pub fn decode_results(text: &str) -> Result<Vec<TestResult>, RecordError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            decode_result(line).map_err(|e| RecordError::AtLine {
                line: idx + 1,
                source: Box::new(e),
            })
        })
        .collect()
}
