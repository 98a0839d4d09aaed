//! Drift audit endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::engine::DriftReport;
use crate::error::CatalogResult;
use crate::AppState;

/// GET /api/audit
///
/// Lists descriptors without files and files or folders without descriptors.
pub async fn run_audit(State(state): State<AppState>) -> CatalogResult<Json<DriftReport>> {
    Ok(Json(state.engine.audit().await?))
}

pub fn audit_routes() -> Router<AppState> {
    Router::new().route("/audit", get(run_audit))
}
