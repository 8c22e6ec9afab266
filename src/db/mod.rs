/// Database layer for Slated
///
/// Manages the SQLite connection pool, schema setup, and typed access to
/// account, session, linked-account, and scheduled-content records.

pub mod models;

use crate::error::{SlatedError, SlatedResult};
use sqlx::sqlite::SqlitePool;
use std::path::Path;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> SlatedResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePool::connect_with(
        sqlx::sqlite::SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(if options.enable_wal {
                sqlx::sqlite::SqliteJournalMode::Wal
            } else {
                sqlx::sqlite::SqliteJournalMode::Delete
            })
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5)),
    )
    .await
    .map_err(SlatedError::Database)?;

    Ok(pool)
}

/// Create schema. Idempotent, runs at startup.
pub async fn init_schema(pool: &SqlitePool) -> SlatedResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(SlatedError::Database)?;
    }

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> SlatedResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(SlatedError::Database)?;

    Ok(())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS account (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT UNIQUE NOT NULL,
        password_hash TEXT,
        display_name TEXT NOT NULL,
        verified BOOLEAN NOT NULL DEFAULT 0,
        profile_image_url TEXT,
        month_token TEXT,
        month_token_expires_at DATETIME,
        created_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pending_account (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT UNIQUE NOT NULL,
        password_hash TEXT NOT NULL,
        display_name TEXT NOT NULL,
        verification_code TEXT NOT NULL,
        code_expires_at DATETIME NOT NULL,
        created_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS linked_account (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL,
        platform TEXT NOT NULL,
        platform_user_id TEXT NOT NULL,
        display_name TEXT NOT NULL,
        avatar_url TEXT,
        access_token TEXT NOT NULL,
        linked_at DATETIME NOT NULL,
        UNIQUE (account_id, platform),
        UNIQUE (platform, platform_user_id),
        FOREIGN KEY (account_id) REFERENCES account(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scheduled_content (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL,
        platform TEXT NOT NULL,
        media_url TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        tags TEXT NOT NULL,
        fire_at DATETIME NOT NULL,
        status TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        FOREIGN KEY (account_id) REFERENCES account(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS session (
        id TEXT PRIMARY KEY,
        account_id INTEGER NOT NULL,
        daily_token TEXT NOT NULL,
        csrf_state TEXT,
        created_at DATETIME NOT NULL,
        expires_at DATETIME NOT NULL,
        FOREIGN KEY (account_id) REFERENCES account(id)
    )
    "#,
];
