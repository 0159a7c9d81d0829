//! Fragment decomposition.
//!
//! Splits a document's indexable text into an ordered sequence of
//! fragments: one each for title/excerpt/url, then one per body chunk.
//! Body chunking happens on paragraph boundaries (`\n\n`) under a
//! configurable `max_tokens` limit so each fragment stays retrieval-sized.
//!
//! All fragments of one document generation are written in a single
//! transaction with insert-or-ignore semantics, so a retriggered insertion
//! for the same `(document, attribute, ord)` is silently skipped instead of
//! failing the batch.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{FragmentAttribute, FragmentSeed};

/// Approximate chars-per-token ratio used to size body chunks.
const CHARS_PER_TOKEN: usize = 4;

/// Split body text into chunks on paragraph boundaries, respecting
/// `max_tokens`. Returns an ordered sequence of non-empty chunks; blank
/// input produces no chunks.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;

    if text.trim().is_empty() {
        return Vec::new();
    }

    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    let mut chunks = Vec::new();
    let mut current_buf = String::new();

    for para in paragraphs {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        // If adding this paragraph would exceed max, flush current buffer
        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len() // +2 for \n\n separator
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(std::mem::take(&mut current_buf));
        }

        // If a single paragraph exceeds max, split it at word boundaries
        if trimmed.len() > max_chars {
            if !current_buf.is_empty() {
                chunks.push(std::mem::take(&mut current_buf));
            }
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = remaining.len().min(max_chars);
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind('\n')
                        .or_else(|| remaining[..split_at].rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                let piece = remaining[..actual_split].trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
                remaining = &remaining[actual_split..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        chunks.push(current_buf);
    }

    chunks
}

/// Decompose a document's fields into fragment seeds.
///
/// Title, excerpt, and url each yield one fragment at ord 0 when non-empty;
/// the body yields one `content` fragment per chunk at ord 0..N-1.
pub fn decompose(
    document_id: i64,
    title: Option<&str>,
    excerpt: Option<&str>,
    url: &str,
    content: Option<&str>,
    max_tokens: usize,
) -> Vec<FragmentSeed> {
    let mut seeds = Vec::new();

    let singles = [
        (FragmentAttribute::Title, title),
        (FragmentAttribute::Excerpt, excerpt),
        (FragmentAttribute::Url, Some(url)),
    ];

    for (attribute, value) in singles {
        if let Some(value) = value {
            if !value.trim().is_empty() {
                seeds.push(FragmentSeed {
                    document_id,
                    attribute,
                    value: value.to_string(),
                    ord: 0,
                });
            }
        }
    }

    if let Some(body) = content {
        for (i, chunk) in chunk_text(body, max_tokens).into_iter().enumerate() {
            seeds.push(FragmentSeed {
                document_id,
                attribute: FragmentAttribute::Content,
                value: chunk,
                ord: i as i64,
            });
        }
    }

    seeds
}

/// Write all seeds in one transaction. A duplicate
/// `(document_id, attribute, ord)` is skipped, not an error.
pub async fn insert_fragments(pool: &SqlitePool, seeds: &[FragmentSeed]) -> Result<()> {
    let now = Utc::now().timestamp_millis();
    let mut tx = pool.begin().await?;

    for seed in seeds {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO document_fragment (document_id, attribute, value, ord, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(seed.document_id)
        .bind(seed.attribute.as_str())
        .bind(&seed.value)
        .bind(seed.ord)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
