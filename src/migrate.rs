//! Schema migrations.
//!
//! [`run_migrations`] creates the current schema (idempotent). Databases
//! created before the UUID switch used `INTEGER` autoincrement primary keys;
//! [`convert_integer_ids`] rebuilds those tables with UUID text keys and
//! remaps every foreign key, since SQLite cannot alter a column type in
//! place.

use std::collections::HashMap;

use anyhow::Result;
use sqlx::{Connection, Row, SqlitePool};
use uuid::Uuid;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            title TEXT,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (chat_id) REFERENCES chats(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chats_user_id ON chats(user_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_user_id ON documents(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Converts legacy `INTEGER` primary keys to UUID text keys.
///
/// Returns `true` if a conversion took place, `false` if the ids were
/// already text (no-op). Runs in a single transaction on one connection
/// with foreign-key enforcement suspended for the rebuild.
pub async fn convert_integer_ids(pool: &SqlitePool) -> Result<bool> {
    let id_type: Option<String> =
        sqlx::query_scalar("SELECT type FROM pragma_table_info('users') WHERE name = 'id'")
            .fetch_optional(pool)
            .await?;

    let legacy = matches!(id_type.as_deref(), Some(t) if t.eq_ignore_ascii_case("INTEGER"));
    if !legacy {
        return Ok(false);
    }

    let mut conn = pool.acquire().await?;
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;
    let result = rebuild_with_uuid_ids(&mut *conn).await;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;
    result?;

    Ok(true)
}

async fn rebuild_with_uuid_ids(conn: &mut sqlx::SqliteConnection) -> Result<()> {
    let mut tx = conn.begin().await?;

    // Assign a UUID to every existing row, keyed by the old integer id.
    let user_ids = id_map(&mut tx, "users").await?;
    let chat_ids = id_map(&mut tx, "chats").await?;
    let message_ids = id_map(&mut tx, "messages").await?;
    let document_ids = id_map(&mut tx, "documents").await?;

    // users
    sqlx::query(
        r#"
        CREATE TABLE users_new (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let rows = sqlx::query("SELECT id, username, email, created_at FROM users")
        .fetch_all(&mut *tx)
        .await?;
    for row in &rows {
        let old_id: i64 = row.get("id");
        sqlx::query("INSERT INTO users_new (id, username, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(&user_ids[&old_id])
            .bind(row.get::<String, _>("username"))
            .bind(row.get::<Option<String>, _>("email"))
            .bind(row.get::<i64, _>("created_at"))
            .execute(&mut *tx)
            .await?;
    }

    // chats (user_id remapped through the users map)
    sqlx::query(
        r#"
        CREATE TABLE chats_new (
            id TEXT PRIMARY KEY,
            title TEXT,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let rows = sqlx::query("SELECT id, title, user_id, created_at FROM chats")
        .fetch_all(&mut *tx)
        .await?;
    for row in &rows {
        let old_id: i64 = row.get("id");
        let old_user_id: i64 = row.get("user_id");
        sqlx::query("INSERT INTO chats_new (id, title, user_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(&chat_ids[&old_id])
            .bind(row.get::<Option<String>, _>("title"))
            .bind(&user_ids[&old_user_id])
            .bind(row.get::<i64, _>("created_at"))
            .execute(&mut *tx)
            .await?;
    }

    // messages (chat_id remapped through the chats map)
    sqlx::query(
        r#"
        CREATE TABLE messages_new (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (chat_id) REFERENCES chats(id)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let rows = sqlx::query("SELECT id, chat_id, role, content, created_at FROM messages")
        .fetch_all(&mut *tx)
        .await?;
    for row in &rows {
        let old_id: i64 = row.get("id");
        let old_chat_id: i64 = row.get("chat_id");
        sqlx::query(
            "INSERT INTO messages_new (id, chat_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message_ids[&old_id])
        .bind(&chat_ids[&old_chat_id])
        .bind(row.get::<String, _>("role"))
        .bind(row.get::<String, _>("content"))
        .bind(row.get::<i64, _>("created_at"))
        .execute(&mut *tx)
        .await?;
    }

    // documents (user_id remapped through the users map)
    sqlx::query(
        r#"
        CREATE TABLE documents_new (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let rows = sqlx::query(
        "SELECT id, filename, metadata_json, content, embedding, user_id, created_at FROM documents",
    )
    .fetch_all(&mut *tx)
    .await?;
    for row in &rows {
        let old_id: i64 = row.get("id");
        let old_user_id: i64 = row.get("user_id");
        sqlx::query(
            "INSERT INTO documents_new (id, filename, metadata_json, content, embedding, user_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&document_ids[&old_id])
        .bind(row.get::<String, _>("filename"))
        .bind(row.get::<String, _>("metadata_json"))
        .bind(row.get::<String, _>("content"))
        .bind(row.get::<Vec<u8>, _>("embedding"))
        .bind(&user_ids[&old_user_id])
        .bind(row.get::<i64, _>("created_at"))
        .execute(&mut *tx)
        .await?;
    }

    for table in ["users", "chats", "messages", "documents"] {
        sqlx::query(&format!("DROP TABLE {}", table))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("ALTER TABLE {}_new RENAME TO {}", table, table))
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chats_user_id ON chats(user_id)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_user_id ON documents(user_id)")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

async fn id_map(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    table: &str,
) -> Result<HashMap<i64, String>> {
    let old_ids: Vec<i64> = sqlx::query_scalar(&format!("SELECT id FROM {}", table))
        .fetch_all(&mut **tx)
        .await?;

    Ok(old_ids
        .into_iter()
        .map(|id| (id, Uuid::new_v4().to_string()))
        .collect())
}
