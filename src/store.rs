//! Canonical document storage.
//!
//! [`DocumentStore`] owns the primary pool plus the staging mirror and
//! provides the dedup-on-URL upsert, visit "touch" updates, and URL lookup.
//! Every true insertion is duplicated into the staging store as a
//! best-effort backup write; a staging failure is logged and never rolls
//! back the primary write.

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::models::{Document, NewDocument};
use crate::statement::{self, SqlArg};

const DOCUMENT_COLUMNS: &str = "id, title, url, excerpt, content, content_hash, \
     publication_date, hostname, last_visit, last_visit_date, extraction_method, \
     created_at, updated_at";

pub struct DocumentStore {
    pool: SqlitePool,
    staging: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool, staging: SqlitePool) -> Self {
        Self { pool, staging }
    }

    /// The primary pool, for collaborators that write alongside the store
    /// (fragment persistence, search).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert `doc` if its URL is new, returning the stored row; otherwise
    /// refresh the existing row's metadata and return `None`. Only a true
    /// insertion is mirrored into the staging store.
    pub async fn upsert(&self, doc: &NewDocument) -> Result<Option<Document>> {
        if let Some(existing) = self.find_by_url(&doc.url).await? {
            let now = Utc::now().timestamp_millis();

            let mut fields = Map::new();
            fields.insert("excerpt".to_string(), json!(doc.excerpt));
            fields.insert("content".to_string(), json!(doc.content));
            fields.insert("content_hash".to_string(), json!(doc.content_hash));
            fields.insert("last_visit".to_string(), json!(doc.last_visit));
            fields.insert("last_visit_date".to_string(), json!(doc.last_visit_date));
            fields.insert("updated_at".to_string(), json!(now));

            let mut stmt = statement::update("document", &fields, "id = ?");
            stmt.args.push(SqlArg::Integer(existing.id));
            self.log_dropped("update", &stmt.dropped);

            let mut query = sqlx::query(&stmt.sql);
            for arg in &stmt.args {
                query = arg.bind_to(query);
            }
            query.execute(&self.pool).await?;

            return Ok(None);
        }

        let now = Utc::now().timestamp_millis();
        let fields = insert_fields(doc, now);

        let stmt = statement::insert_into("document", &fields);
        self.log_dropped("insert", &stmt.dropped);

        let mut query = sqlx::query(&stmt.sql);
        for arg in &stmt.args {
            query = arg.bind_to(query);
        }
        let result = query.execute(&self.pool).await?;
        let id = result.last_insert_rowid();

        // Best-effort duplicate into the staging mirror. The two files are
        // never reconciled; a failure here leaves the primary write intact.
        let mut mirror = sqlx::query(&stmt.sql);
        for arg in &stmt.args {
            mirror = arg.bind_to(mirror);
        }
        if let Err(e) = mirror.execute(&self.staging).await {
            warn!(url = %doc.url, error = %e, "staging mirror insert failed");
        }

        self.find_by_id(id).await
    }

    /// Refresh only the visit bookkeeping on an existing document.
    pub async fn touch(
        &self,
        id: i64,
        updated_at: i64,
        last_visit: i64,
        last_visit_date: &str,
    ) -> Result<()> {
        let mut fields = Map::new();
        fields.insert("updated_at".to_string(), json!(updated_at));
        fields.insert("last_visit".to_string(), json!(last_visit));
        fields.insert("last_visit_date".to_string(), json!(last_visit_date));

        let mut stmt = statement::update("document", &fields, "id = ?");
        stmt.args.push(SqlArg::Integer(id));

        let mut query = sqlx::query(&stmt.sql);
        for arg in &stmt.args {
            query = arg.bind_to(query);
        }
        query.execute(&self.pool).await?;

        Ok(())
    }

    /// Exact-URL lookup. The url column is unique, so more than one match
    /// means the invariant broke somewhere: warn and return the first.
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM document WHERE url = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(url)
        .fetch_all(&self.pool)
        .await?;

        if rows.len() > 1 {
            warn!(url, matches = rows.len(), "expected at most one document per url");
        }

        Ok(rows.first().map(document_from_row))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM document WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(document_from_row))
    }

    fn log_dropped(&self, operation: &str, dropped: &[String]) {
        if !dropped.is_empty() {
            warn!(operation, fields = ?dropped, "dropped unconvertible fields from statement");
        }
    }
}

fn insert_fields(doc: &NewDocument, now: i64) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("title".to_string(), json!(doc.title));
    fields.insert("url".to_string(), json!(doc.url));
    fields.insert("excerpt".to_string(), json!(doc.excerpt));
    fields.insert("content".to_string(), json!(doc.content));
    fields.insert("content_hash".to_string(), json!(doc.content_hash));
    fields.insert("publication_date".to_string(), json!(doc.publication_date));
    fields.insert("hostname".to_string(), json!(doc.hostname));
    fields.insert("last_visit".to_string(), json!(doc.last_visit));
    fields.insert("last_visit_date".to_string(), json!(doc.last_visit_date));
    fields.insert(
        "extraction_method".to_string(),
        json!(doc.extraction_method),
    );
    fields.insert("created_at".to_string(), json!(now));
    fields.insert("updated_at".to_string(), json!(now));
    fields
}

fn document_from_row(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        title: row.get("title"),
        url: row.get("url"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_hash: row.get("content_hash"),
        publication_date: row.get("publication_date"),
        hostname: row.get("hostname"),
        last_visit: row.get("last_visit"),
        last_visit_date: row.get("last_visit_date"),
        extraction_method: row.get("extraction_method"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
