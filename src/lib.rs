//! # Pagestash
//!
//! Local indexing and full-text search engine for a personal web-page
//! archive.
//!
//! Every page the hosting application visits is normalized into a document,
//! decomposed into searchable fragments, and made queryable through FTS5
//! with highlighted snippets. Pagestash owns the storage side of that
//! pipeline: schema migrations, dedup-on-URL upserts, fragment
//! decomposition, full-text-index mirroring, and the ranked search path.
//! Content extraction and the decision of whether a URL is worth indexing
//! happen outside this crate.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ page visit │──▶│ DocumentStore │──▶│   SQLite      │
//! │  (host)    │   │ + fragments   │   │ FTS5 + mirror │
//! └────────────┘   └───────────────┘   └──────┬────────┘
//!                                             │
//!                             ┌───────────────┤
//!                             ▼               ▼
//!                        ┌─────────┐    ┌──────────┐
//!                        │   CLI   │    │   HTTP   │
//!                        │(pstash) │    │ (server) │
//!                        └─────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pstash init                                  # create both database files
//! pstash index https://example.com/a --file page.txt
//! pstash search "brown fox"
//! pstash serve                                 # start the HTTP facade
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`statement`] | Parameter binding + SQL statement construction |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Document table + staging mirror |
//! | [`fragment`] | Fragment decomposition |
//! | [`search`] | Full-text search |
//! | [`engine`] | Lifecycle + external operations |
//! | [`server`] | HTTP facade |
//! | [`db`] | Database connection |

pub mod config;
pub mod db;
pub mod engine;
pub mod fragment;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod statement;
pub mod store;
