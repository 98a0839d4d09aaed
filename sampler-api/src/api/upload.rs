//! Sample upload endpoint
//!
//! POST /api/upload/:folder, multipart with a `file` field and an optional
//! `name` text field overriding the display name. A request without the
//! folder segment is rejected with 400.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use sampler_common::Sample;
use serde::Serialize;
use tracing::debug;

use crate::engine::SampleUpload;
use crate::error::{CatalogError, CatalogResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded: u32,
    pub file: Sample,
}

/// POST /api/upload/:folder
pub async fn upload_sample(
    State(state): State<AppState>,
    Path(preset_name): Path<String>,
    mut multipart: Multipart,
) -> CatalogResult<(StatusCode, Json<UploadResponse>)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut display_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CatalogError::InvalidInput(format!("Multipart error: {}", e)))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| CatalogError::InvalidInput("File field has no filename".to_string()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| CatalogError::InvalidInput(format!("Read error: {}", e)))?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| CatalogError::InvalidInput(format!("Read error: {}", e)))?;
                display_name = Some(text);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| CatalogError::InvalidInput("No file was uploaded.".to_string()))?;

    let sample = state
        .engine
        .upload_sample(SampleUpload {
            preset_name,
            file_name,
            display_name,
            bytes,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            uploaded: 1,
            file: sample,
        }),
    ))
}

/// POST /api/upload without a preset folder
pub async fn upload_without_folder() -> CatalogError {
    CatalogError::InvalidInput("No preset folder given for upload".to_string())
}

pub fn upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload/:folder",
            post(upload_sample).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/upload", post(upload_without_folder))
        .route("/upload/", post(upload_without_folder))
}
