//! Gateway web server: application state, router, and entry point.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use serde::Deserialize;
use spate_core::{MetainfoCache, SpateConfig, TorrentEngine, TorrentRefs};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::content;
use crate::error::HttpError;
use crate::resolver;

/// Shared state injected into every handler.
///
/// The reference table is created once here and lives for the process;
/// cloning the state clones cheap handles, not the tables behind them.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn TorrentEngine>,
    pub refs: TorrentRefs,
    pub cache: MetainfoCache,
    pub config: Arc<SpateConfig>,
}

impl AppState {
    pub fn new(config: SpateConfig, engine: Arc<dyn TorrentEngine>) -> Self {
        Self {
            refs: TorrentRefs::new(),
            cache: MetainfoCache::new(config.cache.torrents_dir.clone()),
            config: Arc::new(config),
            engine,
        }
    }
}

/// Query parameters shared by the torrent endpoints.
#[derive(Debug, Deserialize)]
struct TorrentQuery {
    /// Hex-encoded info hash; when absent the request body must carry a
    /// torrent descriptor.
    ih: Option<String>,
    /// Display path of a single file to serve instead of the whole torrent.
    path: Option<String>,
}

/// Builds the gateway router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/data", get(serve_data).post(serve_data))
        .route("/metainfo", get(serve_metainfo).post(serve_metainfo))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the gateway until the listener fails or the process exits.
///
/// # Errors
/// Returns an error when the listen address cannot be bound or the server
/// loop fails.
pub async fn run_server(
    config: SpateConfig,
    engine: Arc<dyn TorrentEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.http.listen_addr;
    let app = router(AppState::new(config, engine));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("gateway listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_data(
    State(state): State<AppState>,
    Query(query): Query<TorrentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpError> {
    let resolved = resolver::resolve(&state, query.ih.as_deref(), &body).await?;
    content::serve(&state, resolved, query.path, &headers).await
}

async fn serve_metainfo(
    State(state): State<AppState>,
    Query(query): Query<TorrentQuery>,
    body: Bytes,
) -> Result<Response, HttpError> {
    let resolved = resolver::resolve(&state, query.ih.as_deref(), &body).await?;
    let handle = resolved.handle().clone();

    tokio::select! {
        _ = handle.metadata_ready() => {}
        _ = handle.closed() => return Err(HttpError::TorrentClosed),
    }

    let metainfo = handle.metainfo()?;
    Ok((
        [(header::CONTENT_TYPE, "application/x-bittorrent")],
        metainfo.to_bytes(),
    )
        .into_response())
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
