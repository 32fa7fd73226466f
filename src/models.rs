//! Core data models.
//!
//! These types represent the entities stored in SQLite and the raw upload
//! that flows through the ingestion pipeline.

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct Chat {
    pub id: String,
    pub title: Option<String>,
    pub user_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
    pub created_at: i64,
}

/// Raw upload accepted at the HTTP boundary, before extraction.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    /// Declared content type (may be wrong; extraction falls back to the
    /// filename extension).
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub user_id: String,
}

/// A fully ingested document as persisted in SQLite.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    /// Open key-value map (filename, content type, counts, hash, embedding
    /// accounting). Stored as `metadata_json TEXT`.
    pub metadata: serde_json::Value,
    /// Extracted plain text.
    pub content: String,
    /// Fixed-length vector; all zeros when the embedding call fell back.
    pub embedding: Vec<f32>,
    pub user_id: String,
    pub created_at: i64,
}
