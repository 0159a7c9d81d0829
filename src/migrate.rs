//! Schema migrations.
//!
//! [`run_migrations`] applies an ordered list of DDL statements to a
//! database, each exactly once across the lifetime of the file. Bookkeeping
//! lives in `internal_migrations`, keyed by the whitespace-trimmed statement
//! text. A statement whose trimmed text changes — even only in internal
//! whitespace — counts as a new statement and runs again; lookup is exact
//! text equality on purpose.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

/// Ordered schema statements for both the primary and the staging store.
///
/// The FTS5 table is an external-content index over `document_fragment`;
/// the three triggers keep it mirrored on every fragment insert, delete,
/// and update.
pub const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS document (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT,
        url TEXT NOT NULL UNIQUE,
        excerpt TEXT,
        content TEXT,
        content_hash TEXT,
        publication_date TEXT,
        hostname TEXT,
        last_visit INTEGER,
        last_visit_date TEXT,
        extraction_method TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS document_fragment (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL REFERENCES document(id) ON DELETE CASCADE,
        attribute TEXT NOT NULL,
        value TEXT,
        ord INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER,
        UNIQUE(document_id, attribute, ord)
    )
    "#,
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS document_fragment_fts USING fts5(
        document_id UNINDEXED,
        attribute UNINDEXED,
        value,
        content='document_fragment',
        content_rowid='id'
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS document_fragment_ai AFTER INSERT ON document_fragment BEGIN
        INSERT INTO document_fragment_fts(rowid, document_id, attribute, value)
        VALUES (new.id, new.document_id, new.attribute, new.value);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS document_fragment_ad AFTER DELETE ON document_fragment BEGIN
        INSERT INTO document_fragment_fts(document_fragment_fts, rowid, document_id, attribute, value)
        VALUES ('delete', old.id, old.document_id, old.attribute, old.value);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS document_fragment_au AFTER UPDATE ON document_fragment BEGIN
        INSERT INTO document_fragment_fts(document_fragment_fts, rowid, document_id, attribute, value)
        VALUES ('delete', old.id, old.document_id, old.attribute, old.value);
        INSERT INTO document_fragment_fts(rowid, document_id, attribute, value)
        VALUES (new.id, new.document_id, new.attribute, new.value);
    END
    "#,
    "CREATE INDEX IF NOT EXISTS idx_document_fragment_document_id ON document_fragment(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_document_updated_at ON document(updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_document_hostname ON document(hostname)",
];

/// Apply `statements` to `pool` in order, skipping any whose trimmed text
/// already has an `internal_migrations` record. Any execution failure
/// aborts the run and is fatal to the initializing caller.
pub async fn run_migrations(pool: &SqlitePool, statements: &[&str]) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS internal_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            statement TEXT NOT NULL UNIQUE,
            timestamp INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for statement in statements {
        let trimmed = statement.trim();

        let already_run: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM internal_migrations WHERE statement = ?",
        )
        .bind(trimmed)
        .fetch_one(pool)
        .await?;

        if already_run {
            continue;
        }

        sqlx::query(trimmed)
            .execute(pool)
            .await
            .with_context(|| format!("migration failed: {}", first_line(trimmed)))?;

        sqlx::query("INSERT INTO internal_migrations (statement, timestamp) VALUES (?, ?)")
            .bind(trimmed)
            .bind(Utc::now().timestamp_millis())
            .execute(pool)
            .await?;

        debug!(statement = first_line(trimmed), "applied migration");
    }

    Ok(())
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement)
}
