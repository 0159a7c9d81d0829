use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use tempfile::TempDir;

use pagestash::config::{ChunkingConfig, Config, DbConfig, SearchConfig, ServerConfig};
use pagestash::db;
use pagestash::engine::Engine;
use pagestash::fragment;
use pagestash::migrate::{self, MIGRATIONS};
use pagestash::models::{FragmentAttribute, FragmentSeed, PagePayload, Visit};

fn test_config(dir: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: dir.path().join("pages.sqlite"),
            staging_path: dir.path().join("pages.staging.sqlite"),
        },
        chunking: ChunkingConfig { max_tokens: 700 },
        search: SearchConfig { default_limit: 100 },
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    }
}

fn payload(title: &str, body: &str) -> PagePayload {
    PagePayload {
        title: Some(title.to_string()),
        excerpt: None,
        content: Some(body.to_string()),
        publication_date: None,
        extraction_method: Some("test".to_string()),
    }
}

async fn ready_engine(dir: &TempDir) -> Engine {
    let engine = Engine::init(test_config(dir)).await;
    assert!(engine.status().ok, "engine failed to initialize");
    engine
}

async fn open_pool(path: PathBuf) -> SqlitePool {
    db::connect(&path).await.unwrap()
}

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}

// ============ Migration runner ============

#[tokio::test]
async fn test_migrations_idempotent() {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(dir.path().join("m.sqlite")).await;

    migrate::run_migrations(&pool, MIGRATIONS).await.unwrap();
    migrate::run_migrations(&pool, MIGRATIONS).await.unwrap();

    let records = count(&pool, "SELECT COUNT(*) FROM internal_migrations").await;
    assert_eq!(records, MIGRATIONS.len() as i64);

    // Schema is usable after the double run
    sqlx::query("INSERT INTO document (url, created_at, updated_at) VALUES ('https://example.com/x', 1, 1)")
        .execute(&pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_whitespace_variant_is_a_distinct_migration() {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(dir.path().join("m.sqlite")).await;

    migrate::run_migrations(&pool, &["CREATE TABLE IF NOT EXISTS t1 (id INTEGER)"])
        .await
        .unwrap();
    // Same statement with different internal whitespace: re-runs and gets
    // its own record.
    migrate::run_migrations(&pool, &["CREATE TABLE IF NOT EXISTS t1  (id INTEGER)"])
        .await
        .unwrap();

    let records = count(&pool, "SELECT COUNT(*) FROM internal_migrations").await;
    assert_eq!(records, 2);
}

#[tokio::test]
async fn test_failed_migration_leaves_engine_not_ready() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    // A directory where the database file should be makes the open fail.
    std::fs::create_dir_all(dir.path().join("blocked")).unwrap();
    config.db.path = dir.path().join("blocked");

    let engine = Engine::init(config).await;
    let status = engine.status();
    assert!(!status.ok);
    assert!(status.error.is_some());

    let err = engine.search("anything", None, None).await;
    assert!(err.is_err());
}

// ============ Upsert / touch ============

#[tokio::test]
async fn test_upsert_dedup_single_row_per_url() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(&dir).await;
    let url = "https://example.com/a";

    let first = engine
        .index_page(&payload("Hello", "first version"), url, &Visit::now())
        .await
        .unwrap();
    assert!(first.message.contains("indexed"));

    let second = engine
        .index_page(&payload("Hello", "second version"), url, &Visit::now())
        .await
        .unwrap();
    assert!(second.message.contains("updated"));

    let pool = open_pool(dir.path().join("pages.sqlite")).await;
    let docs = count(&pool, "SELECT COUNT(*) FROM document").await;
    assert_eq!(docs, 1);
}

#[tokio::test]
async fn test_touch_without_reindex_on_same_hash() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(&dir).await;
    let url = "https://example.com/a";
    let body = "the quick brown fox";

    engine
        .index_page(&payload("Hello", body), url, &Visit::now())
        .await
        .unwrap();

    let pool = open_pool(dir.path().join("pages.sqlite")).await;
    let fragments_before = count(&pool, "SELECT COUNT(*) FROM document_fragment").await;
    let before = engine.find_one(url).await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let outcome = engine
        .index_page(&payload("Hello", body), url, &Visit::now())
        .await
        .unwrap();
    assert!(outcome.message.contains("unchanged"));

    let after = engine.find_one(url).await.unwrap().unwrap();
    assert!(after.updated_at > before.updated_at);
    assert!(after.last_visit.unwrap() > before.last_visit.unwrap());
    assert_eq!(after.content_hash, before.content_hash);

    let fragments_after = count(&pool, "SELECT COUNT(*) FROM document_fragment").await;
    assert_eq!(fragments_after, fragments_before);
}

#[tokio::test]
async fn test_insertion_mirrors_to_staging() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(&dir).await;

    engine
        .index_page(
            &payload("Hello", "mirrored body"),
            "https://example.com/a",
            &Visit::now(),
        )
        .await
        .unwrap();

    let staging = open_pool(dir.path().join("pages.staging.sqlite")).await;
    assert_eq!(count(&staging, "SELECT COUNT(*) FROM document").await, 1);

    // A metadata-only update is not mirrored
    engine
        .index_page(
            &payload("Hello", "changed body"),
            "https://example.com/a",
            &Visit::now(),
        )
        .await
        .unwrap();
    assert_eq!(count(&staging, "SELECT COUNT(*) FROM document").await, 1);
}

// ============ Page status ============

#[tokio::test]
async fn test_page_status_flow() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(&dir).await;
    let url = "https://example.com/a";

    let fresh = engine.page_status(url).await.unwrap();
    assert!(fresh.should_index);

    engine
        .index_page(&payload("Hello", "some body"), url, &Visit::now())
        .await
        .unwrap();

    let known = engine.page_status(url).await.unwrap();
    assert!(!known.should_index);

    let bad = engine.page_status("not a url").await;
    assert!(bad.is_err());
}

// ============ Fragments + index parity ============

#[tokio::test]
async fn test_fragment_insert_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(dir.path().join("f.sqlite")).await;
    migrate::run_migrations(&pool, MIGRATIONS).await.unwrap();

    sqlx::query("INSERT INTO document (url, created_at, updated_at) VALUES ('https://example.com/a', 1, 1)")
        .execute(&pool)
        .await
        .unwrap();

    let seeds = vec![
        FragmentSeed {
            document_id: 1,
            attribute: FragmentAttribute::Title,
            value: "Hello".to_string(),
            ord: 0,
        },
        FragmentSeed {
            document_id: 1,
            attribute: FragmentAttribute::Content,
            value: "the quick brown fox".to_string(),
            ord: 0,
        },
    ];

    fragment::insert_fragments(&pool, &seeds).await.unwrap();
    fragment::insert_fragments(&pool, &seeds).await.unwrap();

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM document_fragment").await, 2);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM document_fragment_fts").await,
        2
    );
}

async fn fragment_ids(pool: &SqlitePool) -> Vec<i64> {
    sqlx::query("SELECT id FROM document_fragment ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|r| r.get::<i64, _>("id"))
        .collect()
}

async fn index_rowids(pool: &SqlitePool) -> Vec<i64> {
    sqlx::query("SELECT rowid FROM document_fragment_fts ORDER BY rowid")
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|r| r.get::<i64, _>("rowid"))
        .collect()
}

#[tokio::test]
async fn test_index_mirrors_fragments_through_mutations() {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(dir.path().join("f.sqlite")).await;
    migrate::run_migrations(&pool, MIGRATIONS).await.unwrap();

    sqlx::query("INSERT INTO document (url, created_at, updated_at) VALUES ('https://example.com/a', 1, 1)")
        .execute(&pool)
        .await
        .unwrap();

    let seeds: Vec<FragmentSeed> = (0..3)
        .map(|i| FragmentSeed {
            document_id: 1,
            attribute: FragmentAttribute::Content,
            value: format!("chunk number {}", i),
            ord: i,
        })
        .collect();
    fragment::insert_fragments(&pool, &seeds).await.unwrap();
    assert_eq!(fragment_ids(&pool).await, index_rowids(&pool).await);

    // Update mirrors through the delete+insert trigger pair
    sqlx::query("UPDATE document_fragment SET value = 'rewritten chunk' WHERE ord = 1")
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(fragment_ids(&pool).await, index_rowids(&pool).await);

    let hits = count(
        &pool,
        "SELECT COUNT(*) FROM document_fragment_fts WHERE document_fragment_fts MATCH 'rewritten'",
    )
    .await;
    assert_eq!(hits, 1);

    // Document deletion cascades to fragments, and the index follows
    sqlx::query("DELETE FROM document WHERE id = 1")
        .execute(&pool)
        .await
        .unwrap();
    assert!(fragment_ids(&pool).await.is_empty());
    assert!(index_rowids(&pool).await.is_empty());
}

// ============ Search ============

#[tokio::test]
async fn test_end_to_end_index_then_search() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(&dir).await;

    engine
        .index_page(
            &payload("Hello", "the quick brown fox"),
            "https://example.com/a",
            &Visit::now(),
        )
        .await
        .unwrap();

    let response = engine.search("fox", None, None).await.unwrap();
    assert_eq!(response.count, 1);
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].url, "https://example.com/a");
    assert!(
        response.results[0].snippet.contains("<mark>fox</mark>"),
        "snippet missing highlight: {}",
        response.results[0].snippet
    );
    assert!(response.perf_ms >= 0.0);
}

#[tokio::test]
async fn test_search_counts_documents_not_fragments() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(&dir).await;

    // "wombat" appears in both the title and the body: still one document
    engine
        .index_page(
            &payload("About the wombat", "the wombat digs burrows"),
            "https://example.com/wombat",
            &Visit::now(),
        )
        .await
        .unwrap();

    let response = engine.search("wombat", None, None).await.unwrap();
    assert_eq!(response.count, 1);
    assert_eq!(response.results.len(), 1);
}

#[tokio::test]
async fn test_search_pagination() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(&dir).await;

    for i in 0..5 {
        engine
            .index_page(
                &payload(
                    &format!("Page {}", i),
                    &format!("kangaroo sighting number {}", i),
                ),
                &format!("https://example.com/{}", i),
                &Visit::now(),
            )
            .await
            .unwrap();
    }

    for (offset, expected) in [(0, 2), (2, 2), (4, 1), (6, 0)] {
        let response = engine
            .search("kangaroo", Some(2), Some(offset))
            .await
            .unwrap();
        assert_eq!(
            response.results.len(),
            expected,
            "limit=2 offset={}",
            offset
        );
        assert_eq!(response.count, 5, "count must be page-independent");
    }
}

#[tokio::test]
async fn test_blank_query_returns_empty() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(&dir).await;

    let response = engine.search("   ", None, None).await.unwrap();
    assert_eq!(response.count, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_search_orders_by_most_recently_touched() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(&dir).await;

    engine
        .index_page(
            &payload("Old", "shared pelican term"),
            "https://example.com/old",
            &Visit::now(),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    engine
        .index_page(
            &payload("New", "shared pelican term"),
            "https://example.com/new",
            &Visit::now(),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    // Re-visiting the old page bumps it back to the top
    engine
        .index_page(
            &payload("Old", "shared pelican term"),
            "https://example.com/old",
            &Visit::now(),
        )
        .await
        .unwrap();

    let response = engine.search("pelican", None, None).await.unwrap();
    assert_eq!(response.count, 2);
    assert_eq!(response.results[0].url, "https://example.com/old");
    assert_eq!(response.results[1].url, "https://example.com/new");
}
