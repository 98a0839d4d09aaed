//! Preset catalog endpoints
//!
//! - GET    /api/presets?q&type&factory&limit&offset
//! - POST   /api/presets
//! - GET    /api/presets/:name
//! - PUT    /api/presets/:name   (full replace)
//! - PATCH  /api/presets/:name   (partial update)
//! - DELETE /api/presets/:name

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use sampler_common::{Preset, PresetDefinition, PresetFilter};
use serde::Serialize;

use crate::engine::{PresetPatch, UpdateMode};
use crate::error::{CatalogError, CatalogResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DeletedPreset {
    pub message: String,
    pub name: String,
}

/// GET /api/presets
pub async fn list_presets(
    State(state): State<AppState>,
    filter: Result<Query<PresetFilter>, axum::extract::rejection::QueryRejection>,
) -> CatalogResult<Json<Vec<Preset>>> {
    let Query(filter) = filter.map_err(|e| CatalogError::InvalidInput(e.body_text()))?;
    Ok(Json(state.engine.list_presets(&filter).await?))
}

/// GET /api/presets/:name
pub async fn get_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> CatalogResult<Json<Preset>> {
    Ok(Json(state.engine.get_preset(&name).await?))
}

/// POST /api/presets
pub async fn create_preset(
    State(state): State<AppState>,
    payload: Result<Json<PresetDefinition>, JsonRejection>,
) -> CatalogResult<(StatusCode, Json<Preset>)> {
    let Json(definition) = payload?;
    let preset = state.engine.create_preset(definition).await?;
    Ok((StatusCode::CREATED, Json(preset)))
}

/// PUT /api/presets/:name
pub async fn replace_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<PresetPatch>, JsonRejection>,
) -> CatalogResult<Json<Preset>> {
    let Json(patch) = payload?;
    Ok(Json(state.engine.update_preset(&name, patch, UpdateMode::Replace).await?))
}

/// PATCH /api/presets/:name
pub async fn update_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<PresetPatch>, JsonRejection>,
) -> CatalogResult<Json<Preset>> {
    let Json(patch) = payload?;
    Ok(Json(state.engine.update_preset(&name, patch, UpdateMode::Merge).await?))
}

/// DELETE /api/presets/:name
pub async fn delete_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> CatalogResult<Json<DeletedPreset>> {
    let deleted = state.engine.delete_preset(&name).await?;
    Ok(Json(DeletedPreset {
        message: "Preset deleted".to_string(),
        name: deleted.name,
    }))
}

pub fn preset_routes() -> Router<AppState> {
    Router::new()
        .route("/presets", get(list_presets).post(create_preset))
        .route(
            "/presets/:name",
            get(get_preset)
                .put(replace_preset)
                .patch(update_preset)
                .delete(delete_preset),
        )
}
