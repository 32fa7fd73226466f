//! Semantic document search over stored embeddings.
//!
//! Embeds the query text, scores every stored document embedding with
//! cosine similarity, and returns a deterministically ordered ranking.
//! A fallback (all-zero) embedding scores 0.0 against any query, so
//! documents whose embedding call failed sink to the bottom rather than
//! breaking the ranking.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};

use crate::config::EmbeddingConfig;
use crate::embedding::{self, blob_to_vec, cosine_similarity};

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub filename: String,
    pub score: f64,
}

pub async fn semantic_search(
    pool: &SqlitePool,
    config: &EmbeddingConfig,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    if !config.is_enabled() {
        bail!("semantic search requires embeddings. Set [embedding] provider in config.");
    }

    let query_embedding = embedding::embed_text(config, query).await?;

    let rows = sqlx::query("SELECT id, filename, embedding, created_at FROM documents")
        .fetch_all(pool)
        .await?;

    let mut scored: Vec<(SearchHit, i64)> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            let score = cosine_similarity(&query_embedding.vector, &vector) as f64;
            let created_at: i64 = row.get("created_at");

            (
                SearchHit {
                    id: row.get("id"),
                    filename: row.get("filename"),
                    score,
                },
                created_at,
            )
        })
        .collect();

    // Sort: score desc, created_at desc, id asc (deterministic)
    scored.sort_by(|a, b| {
        b.0.score
            .partial_cmp(&a.0.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.1.cmp(&a.1))
            .then(a.0.id.cmp(&b.0.id))
    });

    scored.truncate(limit.max(0) as usize);

    Ok(scored.into_iter().map(|(hit, _)| hit).collect())
}
