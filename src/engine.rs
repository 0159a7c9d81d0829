//! Engine lifecycle and external operations.
//!
//! [`Engine::init`] is the single async construction step the hosting
//! application awaits: it opens the primary and staging stores and runs the
//! migrations on both. Any failure leaves the engine permanently in
//! `Failed`, reported by [`Engine::status`] — there is no ambient global
//! state to consult.
//!
//! Per-operation errors are returned as `Result`s; the transport adapters
//! (CLI, HTTP) fold them into that operation's result payload instead of
//! letting them cross the external interface.

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::db;
use crate::fragment;
use crate::migrate::{self, MIGRATIONS};
use crate::models::{
    Ack, Document, EngineStatus, IndexOutcome, NewDocument, PagePayload, PageStatus, Visit,
};
use crate::search::{self, SearchResponse};
use crate::store::DocumentStore;

enum State {
    Ready { store: DocumentStore },
    Failed { error: String },
}

pub struct Engine {
    state: State,
    config: Config,
}

impl Engine {
    /// Open both database files and migrate them. Never panics: a failed
    /// initialization produces an engine whose every operation reports
    /// not-ready.
    pub async fn init(config: Config) -> Engine {
        match Self::try_init(&config).await {
            Ok(store) => Engine {
                state: State::Ready { store },
                config,
            },
            Err(e) => {
                warn!(error = %e, "engine initialization failed");
                Engine {
                    state: State::Failed {
                        error: format!("{:#}", e),
                    },
                    config,
                }
            }
        }
    }

    async fn try_init(config: &Config) -> Result<DocumentStore> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool, MIGRATIONS).await?;

        let staging = db::connect(&config.db.staging_path).await?;
        migrate::run_migrations(&staging, MIGRATIONS).await?;

        Ok(DocumentStore::new(pool, staging))
    }

    fn store(&self) -> Result<&DocumentStore> {
        match &self.state {
            State::Ready { store } => Ok(store),
            State::Failed { error } => Err(anyhow!("engine not ready: {}", error)),
        }
    }

    pub fn status(&self) -> EngineStatus {
        match &self.state {
            State::Ready { .. } => EngineStatus {
                ok: true,
                error: None,
            },
            State::Failed { error } => EngineStatus {
                ok: false,
                error: Some(error.clone()),
            },
        }
    }

    /// Whether `url` should be indexed: true when it is unknown or stored
    /// without content. An existing document gets its visit bookkeeping
    /// touched as a side effect.
    pub async fn page_status(&self, url: &str) -> Result<PageStatus> {
        let store = self.store()?;

        Url::parse(url).map_err(|e| anyhow!("unparseable url {}: {}", url, e))?;

        match store.find_by_url(url).await? {
            Some(doc) => {
                let has_content = doc
                    .content
                    .as_deref()
                    .map(|c| !c.is_empty())
                    .unwrap_or(false);

                let visit = Visit::now();
                store.touch(doc.id, visit.at, visit.at, &visit.date).await?;

                Ok(PageStatus {
                    should_index: !has_content,
                })
            }
            None => Ok(PageStatus { should_index: true }),
        }
    }

    /// Run the upsert + fragment-decomposition pipeline for one page visit.
    pub async fn index_page(
        &self,
        payload: &PagePayload,
        url: &str,
        visit: &Visit,
    ) -> Result<IndexOutcome> {
        let store = self.store()?;

        let parsed = Url::parse(url).map_err(|e| anyhow!("unparseable url {}: {}", url, e))?;
        let hostname = parsed.host_str().map(str::to_string);

        let content_hash = hash_content(payload);
        if content_hash.is_none() {
            warn!(url, "no content to hash; storing document without content hash");
        }

        // Unchanged content needs no re-upsert, just the visit bookkeeping.
        if let Some(existing) = store.find_by_url(url).await? {
            if content_hash.is_some() && existing.content_hash == content_hash {
                store
                    .touch(existing.id, visit.at, visit.at, &visit.date)
                    .await?;
                return Ok(IndexOutcome {
                    ok: true,
                    message: format!("content unchanged, visit recorded for {}", url),
                });
            }
        }

        let new_doc = NewDocument {
            title: payload.title.clone(),
            url: url.to_string(),
            excerpt: payload.excerpt.clone(),
            content: payload.content.clone(),
            content_hash,
            publication_date: payload.publication_date.clone(),
            hostname,
            last_visit: Some(visit.at),
            last_visit_date: Some(visit.date.clone()),
            extraction_method: payload.extraction_method.clone(),
        };

        match store.upsert(&new_doc).await? {
            Some(inserted) => {
                let seeds = fragment::decompose(
                    inserted.id,
                    new_doc.title.as_deref(),
                    new_doc.excerpt.as_deref(),
                    url,
                    new_doc.content.as_deref(),
                    self.config.chunking.max_tokens,
                );
                fragment::insert_fragments(store.pool(), &seeds).await?;

                info!(url, fragments = seeds.len(), "indexed new document");
                Ok(IndexOutcome {
                    ok: true,
                    message: format!("indexed {}", url),
                })
            }
            None => Ok(IndexOutcome {
                ok: true,
                message: format!("updated metadata for {}", url),
            }),
        }
    }

    /// Acknowledge a page an external filter deemed non-indexable. No
    /// storage side effects.
    pub fn nothing_to_index(&self, url: &str) -> Ack {
        debug!(url, "page skipped by external filter");
        Ack { ok: true }
    }

    pub async fn search(
        &self,
        query: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<SearchResponse> {
        let store = self.store()?;
        let limit = limit.unwrap_or(self.config.search.default_limit);
        let offset = offset.unwrap_or(0);
        search::run_search(store.pool(), query, limit, offset).await
    }

    pub async fn find_one(&self, url: &str) -> Result<Option<Document>> {
        self.store()?.find_by_url(url).await
    }
}

/// SHA-256 hex digest of the payload's content body; `None` when there is
/// nothing to hash.
fn hash_content(payload: &PagePayload) -> Option<String> {
    let content = payload.content.as_deref()?.trim();
    if content.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}
