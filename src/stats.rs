//! Database statistics overview.
//!
//! Quick summary of what's stored: row counts per entity, embedding
//! coverage, and the database file size. Used by `chatvault stats`.

use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await?;

    let total_chats: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chats")
        .fetch_one(&pool)
        .await?;

    let total_messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(&pool)
        .await?;

    let total_documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;

    // A fallback embedding reports zero tokens; that metadata field is the
    // only signal separating it from a real vector.
    let embedded_documents: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM documents WHERE CAST(json_extract(metadata_json, '$.embedding_tokens') AS INTEGER) > 0",
    )
    .fetch_one(&pool)
    .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Chat Vault — Database Stats");
    println!("===========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Users:       {}", total_users);
    println!("  Chats:       {}", total_chats);
    println!("  Messages:    {}", total_messages);
    println!("  Documents:   {}", total_documents);
    println!(
        "  Embedded:    {} / {} ({}%)",
        embedded_documents,
        total_documents,
        if total_documents > 0 {
            (embedded_documents * 100) / total_documents
        } else {
            0
        }
    );
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
