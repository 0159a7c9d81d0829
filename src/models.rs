//! Core data types for the archive engine.
//!
//! These types represent the documents, fragments, and operation results
//! that flow through the indexing and retrieval pipeline.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Canonical record for one indexed URL, as stored in the `document` table.
///
/// Timestamps (`last_visit`, `created_at`, `updated_at`) are epoch
/// milliseconds; `last_visit_date` is the calendar form (`YYYY-MM-DD`).
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub title: Option<String>,
    pub url: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub content_hash: Option<String>,
    pub publication_date: Option<String>,
    pub hostname: Option<String>,
    pub last_visit: Option<i64>,
    pub last_visit_date: Option<String>,
    pub extraction_method: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Field set for a document row about to be written.
///
/// `created_at`/`updated_at` are assigned by the store at insert time.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub title: Option<String>,
    pub url: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub content_hash: Option<String>,
    pub publication_date: Option<String>,
    pub hostname: Option<String>,
    pub last_visit: Option<i64>,
    pub last_visit_date: Option<String>,
    pub extraction_method: Option<String>,
}

/// The named slice of a document a fragment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentAttribute {
    Title,
    Excerpt,
    Url,
    Content,
}

impl FragmentAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentAttribute::Title => "title",
            FragmentAttribute::Excerpt => "excerpt",
            FragmentAttribute::Url => "url",
            FragmentAttribute::Content => "content",
        }
    }
}

/// One fragment row to be written for a document generation.
///
/// `ord` is the position within the attribute group: always 0 for
/// title/excerpt/url, 0..N-1 for the content chunks.
#[derive(Debug, Clone)]
pub struct FragmentSeed {
    pub document_id: i64,
    pub attribute: FragmentAttribute,
    pub value: String,
    pub ord: i64,
}

/// Extracted page fields handed over by the hosting application.
///
/// Extraction itself (HTML → text/markdown) happens outside this crate;
/// the payload arrives ready to store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PagePayload {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub publication_date: Option<String>,
    pub extraction_method: Option<String>,
}

/// Visit timestamps accompanying a page event.
#[derive(Debug, Clone, Deserialize)]
pub struct Visit {
    /// Epoch milliseconds.
    pub at: i64,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
}

impl Visit {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            at: now.timestamp_millis(),
            date: now.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Result of `Engine::status`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `Engine::page_status`.
#[derive(Debug, Clone, Serialize)]
pub struct PageStatus {
    pub should_index: bool,
}

/// Result of `Engine::index_page`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexOutcome {
    pub ok: bool,
    pub message: String,
}

/// Acknowledgment for pages an external filter deemed non-indexable.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub ok: bool,
}
