//! Sample endpoints
//!
//! - PATCH  /api/presets/:name/samples/:filename  body `{name: newBaseName}`
//! - DELETE /api/presets/:name/samples/:filename

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::patch,
    Json, Router,
};
use sampler_common::Sample;
use serde::{Deserialize, Serialize};

use crate::engine::SampleRename;
use crate::error::CatalogResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RenameSampleRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RenamedSample {
    pub ok: bool,
    #[serde(flatten)]
    pub rename: SampleRename,
}

#[derive(Debug, Serialize)]
pub struct DeletedSample {
    pub message: String,
    pub name: String,
    pub filename: String,
    pub sample: Sample,
}

/// PATCH /api/presets/:name/samples/:filename
pub async fn rename_sample(
    State(state): State<AppState>,
    Path((name, filename)): Path<(String, String)>,
    payload: Result<Json<RenameSampleRequest>, JsonRejection>,
) -> CatalogResult<Json<RenamedSample>> {
    let Json(request) = payload?;
    let rename = state
        .engine
        .rename_sample(&name, &filename, &request.name)
        .await?;
    Ok(Json(RenamedSample { ok: true, rename }))
}

/// DELETE /api/presets/:name/samples/:filename
pub async fn delete_sample(
    State(state): State<AppState>,
    Path((name, filename)): Path<(String, String)>,
) -> CatalogResult<Json<DeletedSample>> {
    let sample = state.engine.delete_sample(&name, &filename).await?;
    Ok(Json(DeletedSample {
        message: "Sample deleted".to_string(),
        name,
        filename,
        sample,
    }))
}

pub fn sample_routes() -> Router<AppState> {
    Router::new().route(
        "/presets/:name/samples/:filename",
        patch(rename_sample).delete(delete_sample),
    )
}
