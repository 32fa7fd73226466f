//! Entity persistence: inline SQL over the shared pool.
//!
//! Create/fetch operations for users, chats, and messages, plus document
//! insert/fetch for the ingestion pipeline and the read endpoints. Documents
//! are only ever inserted here — the pipeline never updates a row.

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::{Chat, Document, Message, User};

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    email: Option<&str>,
) -> Result<User> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        email: email.map(|e| e.to_string()),
        created_at: Utc::now().timestamp(),
    };

    sqlx::query("INSERT INTO users (id, username, email, created_at) VALUES (?, ?, ?, ?)")
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(pool)
        .await?;

    Ok(user)
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, username, email, created_at FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }))
}

pub async fn create_chat(
    pool: &SqlitePool,
    title: Option<&str>,
    user_id: &str,
) -> Result<Chat> {
    let chat = Chat {
        id: Uuid::new_v4().to_string(),
        title: title.map(|t| t.to_string()),
        user_id: user_id.to_string(),
        created_at: Utc::now().timestamp(),
    };

    sqlx::query("INSERT INTO chats (id, title, user_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(&chat.id)
        .bind(&chat.title)
        .bind(&chat.user_id)
        .bind(chat.created_at)
        .execute(pool)
        .await?;

    Ok(chat)
}

pub async fn get_chat(pool: &SqlitePool, id: &str) -> Result<Option<Chat>> {
    let row = sqlx::query("SELECT id, title, user_id, created_at FROM chats WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Chat {
        id: row.get("id"),
        title: row.get("title"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }))
}

pub async fn create_message(
    pool: &SqlitePool,
    chat_id: &str,
    role: &str,
    content: &str,
) -> Result<Message> {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        role: role.to_string(),
        content: content.to_string(),
        created_at: Utc::now().timestamp(),
    };

    sqlx::query(
        "INSERT INTO messages (id, chat_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.chat_id)
    .bind(&message.role)
    .bind(&message.content)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    Ok(message)
}

pub async fn get_message(pool: &SqlitePool, id: &str) -> Result<Option<Message>> {
    let row =
        sqlx::query("SELECT id, chat_id, role, content, created_at FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|row| Message {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        role: row.get("role"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }))
}

pub async fn insert_document(pool: &SqlitePool, doc: &Document) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, filename, metadata_json, content, embedding, user_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.filename)
    .bind(doc.metadata.to_string())
    .bind(&doc.content)
    .bind(vec_to_blob(&doc.embedding))
    .bind(&doc.user_id)
    .bind(doc.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
    let row = sqlx::query(
        "SELECT id, filename, metadata_json, content, embedding, user_id, created_at FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let metadata_json: String = row.get("metadata_json");
        let metadata: serde_json::Value =
            serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({}));
        let blob: Vec<u8> = row.get("embedding");

        Document {
            id: row.get("id"),
            filename: row.get("filename"),
            metadata,
            content: row.get("content"),
            embedding: blob_to_vec(&blob),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
        }
    }))
}
