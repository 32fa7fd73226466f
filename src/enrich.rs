//! Descriptive metadata for uploaded blobs.
//!
//! Pure computation over the raw bytes and the extracted text. There is no
//! failure path: once extraction has succeeded the inputs are well-formed.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Deterministic statistics for one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentStats {
    pub size_bytes: usize,
    /// Whitespace-separated token count of the extracted text.
    pub word_count: usize,
    /// Newline count + 1.
    pub line_count: usize,
    /// Lowercase hex SHA-256 of the raw upload bytes.
    pub sha256: String,
    /// Capture timestamp, ISO-8601.
    pub upload_time: String,
    /// Capture timestamp, Unix epoch seconds.
    pub upload_time_epoch: i64,
}

pub fn compute(raw: &[u8], text: &str, captured_at: DateTime<Utc>) -> ContentStats {
    let mut hasher = Sha256::new();
    hasher.update(raw);

    ContentStats {
        size_bytes: raw.len(),
        word_count: text.split_whitespace().count(),
        line_count: text.matches('\n').count() + 1,
        sha256: format!("{:x}", hasher.finalize()),
        upload_time: captured_at.to_rfc3339(),
        upload_time_epoch: captured_at.timestamp(),
    }
}
