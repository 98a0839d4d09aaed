//! sampler-api library - preset catalog service
//!
//! Keeps the preset catalog (Metadata Store) and the sample tree (Filesystem
//! Store) coherent under concurrent writes and partial failures.

use axum::Router;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod engine;
pub mod error;
pub mod storage;
pub mod store;
pub mod sync;

pub use crate::engine::ConsistencyEngine;
pub use crate::error::{CatalogError, CatalogResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConsistencyEngine>,
    /// Root of the sample tree, served read-only under /presets
    pub data_dir: PathBuf,
    /// Body limit of the upload route
    pub max_upload_bytes: usize,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<ConsistencyEngine>, data_dir: PathBuf, max_upload_bytes: usize) -> Self {
        Self {
            engine,
            data_dir,
            max_upload_bytes,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(api::preset_routes())
        .merge(api::sample_routes())
        .merge(api::upload_routes(state.max_upload_bytes))
        .merge(api::audit_routes())
        .merge(api::health_routes());

    Router::new()
        .nest("/api", api)
        .nest_service("/presets", ServeDir::new(&state.data_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
