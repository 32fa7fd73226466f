//! Integration tests for the ingestion pipeline and schema migrations.
//!
//! These run in-process against a temporary database. The embedding
//! provider stays disabled, so every ingest exercises the zero-vector
//! fallback path — which is also what the fallback scenarios assert.

use std::io::Write;
use std::path::Path;

use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use chat_vault::config::{Config, DbConfig, EmbeddingConfig, ServerConfig};
use chat_vault::ingest::{self, IngestError};
use chat_vault::models::DocumentUpload;
use chat_vault::{db, migrate, store};

fn test_config(root: &Path) -> Config {
    Config {
        db: DbConfig {
            path: root.join("chatvault.sqlite"),
        },
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
        embedding: EmbeddingConfig::default(),
    }
}

async fn setup_pool() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (tmp, pool)
}

fn upload(filename: &str, content_type: &str, bytes: &[u8], user_id: &str) -> DocumentUpload {
    DocumentUpload {
        filename: filename.to_string(),
        content_type: content_type.to_string(),
        bytes: bytes.to_vec(),
        user_id: user_id.to_string(),
    }
}

fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect::<String>();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (_tmp, pool) = setup_pool().await;
    migrate::run_migrations(&pool).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
}

#[tokio::test]
async fn plain_text_upload_persists_with_fallback_embedding() {
    let (_tmp, pool) = setup_pool().await;
    let user = store::create_user(&pool, "alice", None).await.unwrap();
    let config = EmbeddingConfig::default();

    let doc = ingest::ingest_document(
        &pool,
        &config,
        upload("hello.txt", "text/plain", b"hello world", &user.id),
    )
    .await
    .unwrap();

    assert_eq!(doc.content, "hello world");
    assert_eq!(doc.embedding.len(), 1536);
    assert!(doc.embedding.iter().all(|&x| x == 0.0));

    assert_eq!(doc.metadata["word_count"], 2);
    assert_eq!(doc.metadata["line_count"], 1);
    assert_eq!(doc.metadata["size_bytes"], 11);
    assert_eq!(doc.metadata["embedding_dim"], 1536);
    assert_eq!(doc.metadata["embedding_tokens"], 0);
    assert_eq!(doc.metadata["embedding_cost_usd"], 0.0);
    assert_eq!(doc.metadata["content_type"], "text/plain");
    assert_eq!(doc.metadata["filename"], "hello.txt");

    // Round-trip through storage
    let stored = store::get_document(&pool, &doc.id).await.unwrap().unwrap();
    assert_eq!(stored.content, "hello world");
    assert_eq!(stored.embedding.len(), 1536);
    assert_eq!(stored.metadata["sha256"], doc.metadata["sha256"]);
    assert_eq!(stored.user_id, user.id);
}

#[tokio::test]
async fn unsupported_content_type_is_rejected_and_echoed() {
    let (_tmp, pool) = setup_pool().await;
    let user = store::create_user(&pool, "alice", None).await.unwrap();
    let config = EmbeddingConfig::default();

    let err = ingest::ingest_document(
        &pool,
        &config,
        upload("data.json", "application/json", b"{}", &user.id),
    )
    .await
    .unwrap_err();

    match err {
        IngestError::UnsupportedFormat(ct) => assert_eq!(ct, "application/json"),
        other => panic!("expected UnsupportedFormat, got {:?}", other),
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0, "no partial document may be written");
}

#[tokio::test]
async fn whitespace_only_text_is_empty_content() {
    let (_tmp, pool) = setup_pool().await;
    let user = store::create_user(&pool, "alice", None).await.unwrap();
    let config = EmbeddingConfig::default();

    let err = ingest::ingest_document(
        &pool,
        &config,
        upload("blank.txt", "text/plain", b"   \n \n\t  ", &user.id),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, IngestError::EmptyContent));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn invalid_utf8_text_is_extraction_failure() {
    let (_tmp, pool) = setup_pool().await;
    let user = store::create_user(&pool, "alice", None).await.unwrap();
    let config = EmbeddingConfig::default();

    let err = ingest::ingest_document(
        &pool,
        &config,
        upload("bad.txt", "text/plain", &[0xff, 0xfe, 0x41], &user.id),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, IngestError::ExtractionFailed(_)));
}

#[tokio::test]
async fn content_hash_is_stable_across_ingests() {
    let (_tmp, pool) = setup_pool().await;
    let user = store::create_user(&pool, "alice", None).await.unwrap();
    let config = EmbeddingConfig::default();

    let first = ingest::ingest_document(
        &pool,
        &config,
        upload("a.txt", "text/plain", b"identical bytes", &user.id),
    )
    .await
    .unwrap();
    let second = ingest::ingest_document(
        &pool,
        &config,
        upload("b.txt", "text/plain", b"identical bytes", &user.id),
    )
    .await
    .unwrap();

    assert_eq!(first.metadata["sha256"], second.metadata["sha256"]);
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn docx_upload_joins_paragraphs_with_newlines() {
    let (_tmp, pool) = setup_pool().await;
    let user = store::create_user(&pool, "alice", None).await.unwrap();
    let config = EmbeddingConfig::default();

    let bytes = docx_bytes(&["office test phrase", "second paragraph"]);
    let doc = ingest::ingest_document(
        &pool,
        &config,
        upload(
            "report.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            &bytes,
            &user.id,
        ),
    )
    .await
    .unwrap();

    assert_eq!(doc.content, "office test phrase\nsecond paragraph");
    assert_eq!(doc.metadata["line_count"], 2);
}

#[tokio::test]
async fn unknown_owner_fails_at_persistence() {
    let (_tmp, pool) = setup_pool().await;
    let config = EmbeddingConfig::default();

    let err = ingest::ingest_document(
        &pool,
        &config,
        upload(
            "hello.txt",
            "text/plain",
            b"hello world",
            &Uuid::new_v4().to_string(),
        ),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, IngestError::Storage(_)));
}

// ============ integer-id → UUID conversion ============

async fn setup_legacy_pool() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = db::connect(&config).await.unwrap();

    sqlx::query(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, username TEXT NOT NULL UNIQUE, email TEXT, created_at INTEGER NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE chats (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT, user_id INTEGER NOT NULL REFERENCES users(id), created_at INTEGER NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE messages (id INTEGER PRIMARY KEY AUTOINCREMENT, chat_id INTEGER NOT NULL REFERENCES chats(id), role TEXT NOT NULL, content TEXT NOT NULL, created_at INTEGER NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE documents (id INTEGER PRIMARY KEY AUTOINCREMENT, filename TEXT NOT NULL, metadata_json TEXT NOT NULL DEFAULT '{}', content TEXT NOT NULL, embedding BLOB NOT NULL, user_id INTEGER NOT NULL REFERENCES users(id), created_at INTEGER NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query("INSERT INTO users (username, email, created_at) VALUES ('alice', NULL, 1000)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO users (username, email, created_at) VALUES ('bob', 'bob@example.com', 1001)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO chats (title, user_id, created_at) VALUES ('greetings', 1, 1002)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO messages (chat_id, role, content, created_at) VALUES (1, 'user', 'hi', 1003)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO documents (filename, metadata_json, content, embedding, user_id, created_at) VALUES ('notes.txt', '{}', 'notes', x'00000000', 2, 1004)",
    )
    .execute(&pool)
    .await
    .unwrap();

    (tmp, pool)
}

#[tokio::test]
async fn convert_integer_ids_rewrites_keys_and_foreign_keys() {
    let (_tmp, pool) = setup_legacy_pool().await;

    let converted = migrate::convert_integer_ids(&pool).await.unwrap();
    assert!(converted);

    let alice_id: String = sqlx::query_scalar("SELECT id FROM users WHERE username = 'alice'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let bob_id: String = sqlx::query_scalar("SELECT id FROM users WHERE username = 'bob'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(Uuid::parse_str(&alice_id).is_ok());
    assert!(Uuid::parse_str(&bob_id).is_ok());
    assert_ne!(alice_id, bob_id);

    // Chat belonged to alice (old id 1)
    let (chat_id, chat_user): (String, String) =
        sqlx::query_as("SELECT id, user_id FROM chats WHERE title = 'greetings'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(Uuid::parse_str(&chat_id).is_ok());
    assert_eq!(chat_user, alice_id);

    // Message belonged to that chat
    let message_chat: String = sqlx::query_scalar("SELECT chat_id FROM messages")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(message_chat, chat_id);

    // Document belonged to bob (old id 2), content untouched
    let (doc_user, doc_content): (String, String) =
        sqlx::query_as("SELECT user_id, content FROM documents WHERE filename = 'notes.txt'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(doc_user, bob_id);
    assert_eq!(doc_content, "notes");
}

#[tokio::test]
async fn convert_integer_ids_is_a_noop_on_uuid_schema() {
    let (_tmp, pool) = setup_legacy_pool().await;

    assert!(migrate::convert_integer_ids(&pool).await.unwrap());
    // Second run sees TEXT ids and does nothing.
    assert!(!migrate::convert_integer_ids(&pool).await.unwrap());

    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(user_count, 2);
}

#[tokio::test]
async fn fresh_schema_needs_no_conversion() {
    let (_tmp, pool) = setup_pool().await;
    assert!(!migrate::convert_integer_ids(&pool).await.unwrap());
}
