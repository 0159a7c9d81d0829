//! Ranked full-text search.
//!
//! Executes an FTS5 `MATCH` against the fragment index, joins the matches
//! back to their owning documents, and returns one highlighted row per
//! document. Ordering is `document.updated_at DESC` — most recently
//! touched first; FTS5 carries no ranking column here.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::time::Instant;

/// Highlight window in tokens for the matched snippet.
const SNIPPET_TOKENS: i32 = 24;

/// One matched document with its highlighted snippet.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document_id: i64,
    pub url: String,
    pub hostname: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content_hash: Option<String>,
    pub last_visit: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub snippet: String,
}

/// A page of results, the total match count (independent of the page), and
/// the wall-clock duration of the query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub count: i64,
    pub perf_ms: f64,
}

pub async fn run_search(
    pool: &SqlitePool,
    query: &str,
    limit: i64,
    offset: i64,
) -> Result<SearchResponse> {
    let started = Instant::now();

    if query.trim().is_empty() {
        return Ok(SearchResponse {
            results: Vec::new(),
            count: 0,
            perf_ms: elapsed_ms(started),
        });
    }

    // Total matches across all pages. A term hitting several fragments of
    // one page still counts that page once.
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT document_id) FROM document_fragment_fts \
         WHERE document_fragment_fts MATCH ?",
    )
    .bind(query)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(&format!(
        r#"
        SELECT d.id, d.url, d.hostname, d.title, d.excerpt, d.content_hash,
               d.last_visit, d.created_at, d.updated_at,
               snippet(document_fragment_fts, 2, '<mark>', '</mark>', '…', {}) AS snippet
        FROM document_fragment_fts
        JOIN document d ON d.id = document_fragment_fts.document_id
        WHERE document_fragment_fts MATCH ?
        GROUP BY d.id
        ORDER BY d.updated_at DESC
        LIMIT ? OFFSET ?
        "#,
        SNIPPET_TOKENS
    ))
    .bind(query)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let results = rows
        .iter()
        .map(|row| SearchResult {
            document_id: row.get("id"),
            url: row.get("url"),
            hostname: row.get("hostname"),
            title: row.get("title"),
            excerpt: row.get("excerpt"),
            content_hash: row.get("content_hash"),
            last_visit: row.get("last_visit"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            snippet: row.get("snippet"),
        })
        .collect();

    Ok(SearchResponse {
        results,
        count,
        perf_ms: elapsed_ms(started),
    })
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
