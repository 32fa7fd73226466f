//! Embedding generation and vector utilities.
//!
//! [`embed_text`] turns extracted document text into a fixed-length vector
//! by calling the OpenAI embeddings API. There is no retry or backoff: one
//! attempt, bounded by the configured client timeout. Failures are reported
//! to the caller — the ingestion pipeline recovers with [`zero_vector`]
//! rather than propagating them.
//!
//! Vector utilities for SQLite storage:
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] — decode a BLOB back into a `Vec<f32>`
//! - [`cosine_similarity`] — similarity score for semantic search

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// A successful embedding: the vector plus the token usage the service
/// reported consuming.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub tokens: i64,
}

/// Embed a single text using the configured provider.
///
/// # Errors
///
/// - `"disabled"` provider: always returns an error (the pipeline's
///   fallback handles it).
/// - `"openai"` provider: missing API key, transport failure, non-success
///   status, or a malformed response body.
pub async fn embed_text(config: &EmbeddingConfig, text: &str) -> Result<Embedding> {
    match config.provider.as_str() {
        "openai" => embed_openai(config, text).await,
        "disabled" => bail!("embedding provider is disabled"),
        other => bail!("unknown embedding provider: {}", other),
    }
}

/// Call the OpenAI embeddings API once.
async fn embed_openai(config: &EmbeddingConfig, text: &str) -> Result<Embedding> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": config.model,
        "input": text,
    });

    let response = client
        .post("https://api.openai.com/v1/embeddings")
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("OpenAI API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    parse_embedding_response(&json)
}

/// Parse `data[0].embedding` and `usage.total_tokens` from the response.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Embedding> {
    let raw = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing data[0].embedding"))?;

    let vector: Vec<f32> = raw.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect();

    let tokens = json
        .get("usage")
        .and_then(|u| u.get("total_tokens"))
        .and_then(|t| t.as_i64())
        .unwrap_or(0);

    Ok(Embedding { vector, tokens })
}

/// The fallback vector: all zeros at the configured dimensionality, so a
/// document row always carries a syntactically valid embedding.
pub fn zero_vector(dims: usize) -> Vec<f32> {
    vec![0.0; dims]
}

/// Estimated cost in USD: `tokens / 1000 * unit_price_per_1k`.
pub fn estimated_cost_usd(tokens: i64, unit_price_per_1k: f64) -> f64 {
    tokens as f64 / 1000.0 * unit_price_per_1k
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
