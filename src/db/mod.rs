//! Database access for versealign
//!
//! Session records live in a single SQLite database; this module owns pool
//! initialization and table migration.

pub mod sessions;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize the database connection pool.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the sessions table if it does not exist.
///
/// Column names mirror the persisted record layout observers read:
/// status, start, end, total, progress, current, error, timestamps,
/// total_length.
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            start TEXT,
            "end" TEXT,
            total INTEGER,
            progress INTEGER,
            current TEXT,
            error TEXT,
            timestamps TEXT NOT NULL DEFAULT '[]',
            total_length REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (sessions)");

    Ok(())
}
