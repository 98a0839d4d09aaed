//! HTTP surface tests
//!
//! Drives the full router with `oneshot`, in-memory Metadata Store and a
//! temp-dir sample tree.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use sampler_api::storage::LocalFileStore;
use sampler_api::store::InMemoryMetadataStore;
use sampler_api::{build_router, AppState, ConsistencyEngine};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "sampler-test-boundary";

struct TestApp {
    _dir: TempDir,
    data_dir: PathBuf,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        Self::with_upload_limit(1024 * 1024)
    }

    fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("presets");
        std::fs::create_dir_all(&data_dir).unwrap();

        let engine = Arc::new(ConsistencyEngine::new(
            Arc::new(InMemoryMetadataStore::new()),
            Arc::new(LocalFileStore::new(data_dir.clone())),
            Duration::from_secs(5),
        ));
        let state = AppState::new(engine, data_dir.clone(), max_upload_bytes);
        Self {
            _dir: dir,
            data_dir,
            state,
        }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

/// Multipart upload with a `file` part and an optional `name` part
fn upload_request(preset: &str, filename: &str, bytes: &[u8], name: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(name) = name {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{}\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: audio/wav\r\n\r\n",
            BOUNDARY, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(format!("/api/upload/{}", preset))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

// =============================================================================
// Health / audit
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();
    let (status, body) = app.send(empty_request("GET", "/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "sampler-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_audit_endpoint_reports_orphans() {
    let app = TestApp::new();
    std::fs::create_dir_all(app.data_dir.join("Stray")).unwrap();

    let (status, body) = app.send(empty_request("GET", "/api/audit")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checkedPresets"], 0);
    assert_eq!(body["orphanFolders"], json!(["Stray"]));
}

// =============================================================================
// Upload / rename walkthrough
// =============================================================================

#[tokio::test]
async fn test_upload_conflict_rename_walkthrough() {
    let app = TestApp::new();

    let (status, body) = app.send(upload_request("MyKit", "kick.wav", b"RIFF1", None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["uploaded"], 1);
    assert_eq!(body["file"]["name"], "kick");
    assert_eq!(body["file"]["url"], "MyKit/kick.wav");
    assert!(app.data_dir.join("MyKit").join("kick.wav").exists());

    let (status, body) = app.send(upload_request("MyKit", "kick.wav", b"RIFF2", None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(
        std::fs::read(app.data_dir.join("MyKit").join("kick.wav")).unwrap(),
        b"RIFF1"
    );

    let (status, body) = app
        .send(json_request("PATCH", "/api/presets/MyKit", json!({ "name": "MyKit2" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "MyKit2");
    assert_eq!(body["samples"][0]["url"], "MyKit2/kick.wav");

    assert!(!app.data_dir.join("MyKit").exists());
    assert!(app.data_dir.join("MyKit2").join("kick.wav").exists());

    let (status, body) = app.send(empty_request("GET", "/api/presets/MyKit")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = app.send(empty_request("GET", "/api/presets/MyKit2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["samples"].as_array().unwrap().len(), 1);
    assert_eq!(body["type"], "Drumkit");
    assert_eq!(body["isFactory"], false);
}

#[tokio::test]
async fn test_upload_with_display_name_field() {
    let app = TestApp::new();
    let (status, body) = app
        .send(upload_request("Kit", "take3.wav", b"x", Some("Big Snare")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["file"]["name"], "Big Snare");
}

#[tokio::test]
async fn test_upload_without_file_is_bad_request() {
    let app = TestApp::new();
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nonly a name\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload/Kit")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_upload_without_folder_is_bad_request() {
    let app = TestApp::new();

    for uri in ["/api/upload", "/api/upload/"] {
        let mut request = upload_request("Kit", "kick.wav", b"x", None);
        *request.uri_mut() = uri.parse().unwrap();

        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }
    assert!(std::fs::read_dir(&app.data_dir).unwrap().next().is_none());
}

#[tokio::test]
async fn test_upload_over_body_limit_is_rejected() {
    let app = TestApp::with_upload_limit(64);
    let (status, _) = app.send(upload_request("Kit", "big.wav", &[0u8; 1024], None)).await;
    assert!(status.is_client_error());
    assert!(!app.data_dir.join("Kit").join("big.wav").exists());
}

#[tokio::test]
async fn test_uploaded_file_is_served_statically() {
    let app = TestApp::new();
    app.send(upload_request("Kit", "kick.wav", b"RIFFDATA", None)).await;

    let response = app
        .router()
        .oneshot(empty_request("GET", "/presets/Kit/kick.wav"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"RIFFDATA");
}

// =============================================================================
// Preset CRUD
// =============================================================================

#[tokio::test]
async fn test_create_list_and_filter_presets() {
    let app = TestApp::new();

    let (status, body) = app
        .send(json_request("POST", "/api/presets", json!({ "name": "Pads", "type": "Synth" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["slug"], "pads");
    assert!(body["id"].is_string());

    let (status, _) = app
        .send(json_request("POST", "/api/presets", json!({ "name": "Pads" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(json_request("POST", "/api/presets", json!({ "name": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.send(upload_request("Drums", "kick.wav", b"x", None)).await;

    let (status, body) = app.send(empty_request("GET", "/api/presets")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app.send(empty_request("GET", "/api/presets?type=synth")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Pads");

    let (_, body) = app.send(empty_request("GET", "/api/presets?q=kick")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Drums");

    let (_, body) = app.send(empty_request("GET", "/api/presets?limit=1&offset=1")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Drums");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/api/presets")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ nope"))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_put_requires_name() {
    let app = TestApp::new();
    app.send(json_request("POST", "/api/presets", json!({ "name": "Kit" }))).await;

    let (status, _) = app
        .send(json_request("PUT", "/api/presets/Kit", json!({ "type": "Synth" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(json_request(
            "PUT",
            "/api/presets/Kit",
            json!({ "name": "Kit", "type": "Synth", "isFactoryPresets": true }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "Synth");
    assert_eq!(body["isFactory"], true);
}

#[tokio::test]
async fn test_delete_preset_endpoint() {
    let app = TestApp::new();
    app.send(upload_request("Gone", "kick.wav", b"x", None)).await;

    let (status, body) = app.send(empty_request("DELETE", "/api/presets/Gone")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Preset deleted");
    assert!(!app.data_dir.join("Gone").exists());

    let (status, _) = app.send(empty_request("DELETE", "/api/presets/Gone")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Samples
// =============================================================================

#[tokio::test]
async fn test_rename_and_delete_sample_endpoints() {
    let app = TestApp::new();
    app.send(upload_request("Kit", "kick.wav", b"x", None)).await;

    let (status, body) = app
        .send(json_request(
            "PATCH",
            "/api/presets/Kit/samples/kick.wav",
            json!({ "name": "boom" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["oldName"], "kick.wav");
    assert_eq!(body["newName"], "boom.wav");
    assert_eq!(body["sample"]["url"], "Kit/boom.wav");
    assert!(app.data_dir.join("Kit").join("boom.wav").exists());

    let (status, _) = app
        .send(json_request(
            "PATCH",
            "/api/presets/Kit/samples/kick.wav",
            json!({ "name": "again" }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(empty_request("DELETE", "/api/presets/Kit/samples/boom.wav"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Sample deleted");
    assert!(!app.data_dir.join("Kit").join("boom.wav").exists());

    let (_, body) = app.send(empty_request("GET", "/api/presets/Kit")).await;
    assert!(body["samples"].as_array().unwrap().is_empty());
}
