//! Document ingestion pipeline orchestration.
//!
//! One upload moves through a linear flow: extract → validate → enrich →
//! embed → persist. Extraction and validation abort the pipeline; the
//! embedding step never does — on any failure the document is stored with a
//! zero vector and zero token/cost accounting. The single `INSERT` at the
//! end is the only externally visible effect, so no partial document is
//! ever written.

use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::config::EmbeddingConfig;
use crate::embedding;
use crate::enrich;
use crate::extract::{self, ExtractError};
use crate::models::{Document, DocumentUpload};
use crate::store;

/// Terminal failure states of the pipeline. All user errors; none are
/// retried. Embedding failures are absent on purpose — they are recovered
/// internally, never surfaced.
#[derive(Debug)]
pub enum IngestError {
    /// Declared type (and extension) not recognized; carries the rejected
    /// content-type.
    UnsupportedFormat(String),
    /// Recognized format, malformed payload.
    ExtractionFailed(String),
    /// Extraction succeeded but produced nothing usable.
    EmptyContent,
    /// Persistence failed; opaque infrastructure error.
    Storage(anyhow::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::UnsupportedFormat(ct) => write!(f, "unsupported file type: {}", ct),
            IngestError::ExtractionFailed(msg) => write!(f, "{}", msg),
            IngestError::EmptyContent => write!(f, "no extractable text found in file"),
            IngestError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<ExtractError> for IngestError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFormat(ct) => IngestError::UnsupportedFormat(ct),
            other => IngestError::ExtractionFailed(other.to_string()),
        }
    }
}

/// Run the full pipeline for one upload and persist the resulting document.
///
/// The caller is expected to have verified that `upload.user_id` references
/// an existing user; a dangling reference surfaces as a storage error.
pub async fn ingest_document(
    pool: &SqlitePool,
    config: &EmbeddingConfig,
    upload: DocumentUpload,
) -> Result<Document, IngestError> {
    // Extracted
    let text = extract::extract_text(&upload.bytes, &upload.content_type, &upload.filename)?;

    // Validated
    if text.trim().is_empty() {
        return Err(IngestError::EmptyContent);
    }

    // Enriched
    let captured_at = Utc::now();
    let stats = enrich::compute(&upload.bytes, &text, captured_at);

    // Embedded (never aborts; availability over vector correctness)
    let (vector, tokens) = match embedding::embed_text(config, &text).await {
        Ok(emb) if emb.vector.len() == config.dims => (emb.vector, emb.tokens),
        Ok(emb) => {
            warn!(
                filename = %upload.filename,
                expected = config.dims,
                got = emb.vector.len(),
                "embedding dimensionality mismatch, storing zero vector"
            );
            (embedding::zero_vector(config.dims), 0)
        }
        Err(e) => {
            warn!(
                filename = %upload.filename,
                error = %e,
                "embedding failed, storing zero vector"
            );
            (embedding::zero_vector(config.dims), 0)
        }
    };
    let cost = embedding::estimated_cost_usd(tokens, config.unit_price_per_1k);

    let metadata = json!({
        "filename": upload.filename,
        "content_type": upload.content_type,
        "size_bytes": stats.size_bytes,
        "word_count": stats.word_count,
        "line_count": stats.line_count,
        "sha256": stats.sha256,
        "upload_time": stats.upload_time,
        "upload_time_epoch": stats.upload_time_epoch,
        "embedding_model": config.model,
        "embedding_cost_usd": cost,
        "embedding_dim": vector.len(),
        "embedding_tokens": tokens,
    });

    let doc = Document {
        id: Uuid::new_v4().to_string(),
        filename: upload.filename,
        metadata,
        content: text,
        embedding: vector,
        user_id: upload.user_id,
        created_at: captured_at.timestamp(),
    };

    // Persisted
    store::insert_document(pool, &doc)
        .await
        .map_err(IngestError::Storage)?;

    Ok(doc)
}
