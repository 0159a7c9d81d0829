//! HTTP facade over the engine operations.
//!
//! The hosting application normally reaches the engine through message
//! passing; this server is the transport adapter for anything speaking
//! JSON over HTTP.
//!
//! # Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `GET`  | `/health` | Crate name + version |
//! | `GET`  | `/status` | Engine readiness |
//! | `POST` | `/pages/status` | Should this URL be indexed? |
//! | `POST` | `/pages/index` | Upsert + fragment pipeline |
//! | `POST` | `/pages/skip` | Acknowledge a non-indexable page |
//! | `POST` | `/search` | Full-text search |
//! | `GET`  | `/pages?url=` | Document detail by URL |
//!
//! Operation errors are encoded in the response body (`{ "ok": false,
//! "error": ... }`) rather than thrown across the interface; HTTP status
//! codes are reserved for transport-level problems.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::engine::Engine;
use crate::models::{PagePayload, Visit};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

pub async fn run_server(config: &Config, engine: Arc<Engine>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState { engine };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/pages/status", post(handle_page_status))
        .route("/pages/index", post(handle_index_page))
        .route("/pages/skip", post(handle_skip))
        .route("/search", post(handle_search))
        .route("/pages", get(handle_find_one))
        .layer(cors)
        .with_state(state);

    println!("pagestash server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Operation-level failure folded into a 200 response body.
fn op_error(error: anyhow::Error) -> Response {
    Json(json!({ "ok": false, "error": format!("{:#}", error) })).into_response()
}

// ============ Request types ============

#[derive(Deserialize)]
struct PageRef {
    url: String,
}

#[derive(Deserialize)]
struct IndexRequest {
    url: String,
    #[serde(default)]
    payload: PagePayload,
    visit: Option<Visit>,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize)]
struct FindQuery {
    url: String,
}

// ============ Handlers ============

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_status(State(state): State<AppState>) -> Response {
    Json(state.engine.status()).into_response()
}

async fn handle_page_status(
    State(state): State<AppState>,
    Json(req): Json<PageRef>,
) -> Response {
    match state.engine.page_status(&req.url).await {
        Ok(status) => {
            Json(json!({ "ok": true, "should_index": status.should_index })).into_response()
        }
        Err(e) => op_error(e),
    }
}

async fn handle_index_page(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> Response {
    let visit = req.visit.unwrap_or_else(Visit::now);
    match state.engine.index_page(&req.payload, &req.url, &visit).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => op_error(e),
    }
}

async fn handle_skip(State(state): State<AppState>, Json(req): Json<PageRef>) -> Response {
    Json(state.engine.nothing_to_index(&req.url)).into_response()
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Response {
    match state.engine.search(&req.query, req.limit, req.offset).await {
        Ok(response) => Json(json!({
            "ok": true,
            "results": response.results,
            "count": response.count,
            "perf_ms": response.perf_ms,
        }))
        .into_response(),
        Err(e) => op_error(e),
    }
}

async fn handle_find_one(
    State(state): State<AppState>,
    Query(query): Query<FindQuery>,
) -> Response {
    match state.engine.find_one(&query.url).await {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "error": "document not found" })),
        )
            .into_response(),
        Err(e) => op_error(e),
    }
}
