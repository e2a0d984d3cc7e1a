use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::config::BlobStorage;
use crate::testutil::{test_state, test_state_with};
use crate::AppState;

const BOUNDARY: &str = "course-share-test-boundary";
const PDF_BYTES: &[u8] = b"%PDF-1.4\n% test document\n";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    dir: tempfile::TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_storage(BlobStorage::Disk)
    }

    fn with_storage(blob_storage: BlobStorage) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_with(&dir, blob_storage);
        let router = super::create_router(Arc::clone(&state));
        Self { router, state, dir }
    }

    fn blob_exists(&self, stored_name: &str) -> bool {
        self.dir.path().join("uploads").join(stored_name).exists()
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(req).await
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    async fn upload(&self, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(req).await
    }

    /// Upload a small PDF into math/lecture and return the stored record.
    async fn upload_pdf(&self, display_name: &str) -> Value {
        let (status, body) = self
            .upload(&[
                Part::text("subject", "math"),
                Part::text("module", "lecture"),
                Part::text("displayName", display_name),
                Part::file("week1.pdf", Some("application/pdf"), PDF_BYTES),
            ])
            .await;
        assert_eq!(status, StatusCode::OK, "upload failed: {body}");
        body["file"].clone()
    }
}

struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    content_type: Option<&'a str>,
    data: &'a [u8],
}

impl<'a> Part<'a> {
    fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            filename: None,
            content_type: None,
            data: value.as_bytes(),
        }
    }

    fn file(filename: &'a str, content_type: Option<&'a str>, data: &'a [u8]) -> Self {
        Self {
            name: "file",
            filename: Some(filename),
            content_type,
            data,
        }
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{filename}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(ct) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_pdf_appears_in_bucket() {
    let app = TestApp::new();
    let file = app.upload_pdf("Week 1").await;

    assert_eq!(file["name"], "Week 1");
    assert_eq!(file["fileType"], "pdf");
    assert_eq!(file["mimeType"], "application/pdf");
    assert_eq!(file["originalName"], "week1.pdf");
    assert_eq!(file["byteSize"], PDF_BYTES.len() as u64);
    assert_eq!(file["blob"]["kind"], "disk");

    let (status, files) = app.get("/api/files/math/lecture").await;
    assert_eq!(status, StatusCode::OK);
    let files = files.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["id"], file["id"]);
    assert_eq!(files[0]["name"], "Week 1");
    assert_eq!(files[0]["fileType"], "pdf");

    let stored = file["blob"]["storedName"].as_str().unwrap();
    assert!(app.blob_exists(stored));
}

#[tokio::test]
async fn test_upload_defaults_display_name_to_file_name() {
    let app = TestApp::new();
    let (status, body) = app
        .upload(&[
            Part::text("subject", "history"),
            Part::text("module", "seminar"),
            Part::file("Essay.DOCX", None, b"PK\x03\x04"),
        ])
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["file"]["name"], "Essay.DOCX");
    assert_eq!(body["file"]["fileType"], "word");
    assert_eq!(
        body["file"]["mimeType"],
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    assert!(body["filename"].as_str().unwrap().ends_with(".docx"));
}

#[tokio::test]
async fn test_upload_rejects_executable() {
    let app = TestApp::new();
    let (status, body) = app
        .upload(&[
            Part::text("subject", "math"),
            Part::text("module", "lecture"),
            Part::file("setup.exe", Some("application/octet-stream"), b"MZ"),
        ])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("PDF"));

    let (_, files) = app.get("/api/files/math/lecture").await;
    assert_eq!(files, json!([]));
}

#[tokio::test]
async fn test_upload_rejects_disguised_mime_type() {
    let app = TestApp::new();
    let (status, _) = app
        .upload(&[
            Part::text("subject", "math"),
            Part::text("module", "lecture"),
            Part::file("photo.pdf", Some("image/png"), b"\x89PNG"),
        ])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_rejects_oversize_file() {
    let app = TestApp::new();
    let data = vec![b'a'; 10 * 1024 * 1024 + 1];
    let (status, body) = app
        .upload(&[
            Part::text("subject", "math"),
            Part::text("module", "lecture"),
            Part::file("huge.pdf", Some("application/pdf"), &data),
        ])
        .await;

    assert!(status.is_client_error(), "unexpected status {status}");
    assert_eq!(body["success"], false);

    let (_, files) = app.get("/api/files/math/lecture").await;
    assert_eq!(files, json!([]));
}

#[tokio::test]
async fn test_upload_accepts_file_at_size_limit() {
    let app = TestApp::new();
    let max = app.state.config.max_upload_size as usize;
    let mut data = PDF_BYTES.to_vec();
    data.resize(max, b'a');

    let (status, body) = app
        .upload(&[
            Part::text("subject", "math"),
            Part::text("module", "lecture"),
            Part::file("limit.pdf", Some("application/pdf"), &data),
        ])
        .await;

    assert_eq!(status, StatusCode::OK, "upload failed: {body}");
    assert_eq!(body["file"]["byteSize"], max as u64);

    let stored = body["file"]["blob"]["storedName"].as_str().unwrap();
    let on_disk = std::fs::metadata(app.dir.path().join("uploads").join(stored)).unwrap();
    assert_eq!(on_disk.len(), max as u64);
}

#[tokio::test]
async fn test_upload_requires_known_subject_and_module() {
    let app = TestApp::new();

    let (status, _) = app
        .upload(&[
            Part::text("subject", "astrology"),
            Part::text("module", "lecture"),
            Part::file("a.pdf", None, PDF_BYTES),
        ])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .upload(&[
            Part::text("subject", "math"),
            Part::text("module", "workshop"),
            Part::file("a.pdf", None, PDF_BYTES),
        ])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .upload(&[Part::text("subject", "math"), Part::text("module", "lecture")])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "file field is required");
}

#[tokio::test]
async fn test_inline_upload_embeds_data_url() {
    let app = TestApp::with_storage(BlobStorage::Inline);
    let file = app.upload_pdf("Inline").await;

    assert_eq!(file["blob"]["kind"], "inline");
    let data_url = file["blob"]["dataUrl"].as_str().unwrap();
    assert!(data_url.starts_with("data:application/pdf;base64,"));

    let (_, files) = app.get("/api/files/math/lecture").await;
    assert_eq!(files[0]["blob"]["dataUrl"], data_url);

    assert!(app.state.object_store.is_none());
    assert!(!app.dir.path().join("uploads").exists());
}

#[tokio::test]
async fn test_inline_mode_does_not_serve_uploads() {
    let app = TestApp::with_storage(BlobStorage::Inline);
    let file = app.upload_pdf("Inline").await;

    let (status, _) = app.get("/uploads/anything.pdf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = json!({"fileId": file["id"], "subject": "math", "module": "lecture"});
    let (status, _) = app.json(Method::POST, "/api/delete-file", request).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Rename and delete
// ============================================================================

#[tokio::test]
async fn test_rename_changes_only_display_name() {
    let app = TestApp::new();
    let original = app.upload_pdf("Draft").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/update-filename",
            json!({
                "fileId": original["id"],
                "subject": "math",
                "module": "lecture",
                "newName": "  Final  ",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (_, files) = app.get("/api/files/math/lecture").await;
    let mut expected = original.clone();
    expected["name"] = json!("Final");
    assert_eq!(files, json!([expected]));
}

#[tokio::test]
async fn test_rename_unknown_file_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/api/update-filename",
            json!({"fileId": "nope", "subject": "math", "module": "lecture", "newName": "x"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_rename_rejects_blank_name() {
    let app = TestApp::new();
    let file = app.upload_pdf("Keep").await;
    let (status, _) = app
        .json(
            Method::POST,
            "/api/update-filename",
            json!({"fileId": file["id"], "subject": "math", "module": "lecture", "newName": " "}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_removes_record_and_blob() {
    let app = TestApp::new();
    let file = app.upload_pdf("Gone soon").await;
    let stored = file["blob"]["storedName"].as_str().unwrap().to_string();
    let request = json!({"fileId": file["id"], "subject": "math", "module": "lecture"});

    let (status, body) = app
        .json(Method::POST, "/api/delete-file", request.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, files) = app.get("/api/files/math/lecture").await;
    assert_eq!(files, json!([]));
    assert!(!app.blob_exists(&stored));

    let (status, body) = app.json(Method::POST, "/api/delete-file", request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_rest_routes_by_id() {
    let app = TestApp::new();
    let file = app.upload_pdf("Rest").await;
    let uri = format!("/api/files/{}", file["id"].as_str().unwrap());

    let (status, _) = app
        .json(Method::PUT, &uri, json!({"newName": "Renamed"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, bucket) = app.get("/api/teacher-files/math").await;
    assert_eq!(bucket["lecture"][0]["name"], "Renamed");

    let req = Request::builder()
        .method(Method::DELETE)
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder()
        .method(Method::DELETE)
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_unknown_subject_or_module_lists_empty() {
    let app = TestApp::new();

    let (status, files) = app.get("/api/files/astrology/lecture").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(files, json!([]));

    let (status, files) = app.get("/api/files/math/workshop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(files, json!([]));

    let (status, bucket) = app.get("/api/teacher-files/astrology").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        bucket,
        json!({"lecture": [], "colloquium": [], "seminar": []})
    );
}

#[tokio::test]
async fn test_registry_routes() {
    let app = TestApp::new();
    app.upload_pdf("Listed").await;

    let (status, registry) = app.get("/api/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registry.as_object().unwrap().len(), 10);
    assert_eq!(registry["math"]["lecture"][0]["name"], "Listed");

    let (_, registry) = app.get("/api/files").await;
    assert_eq!(registry.as_object().unwrap().len(), 10);

    let (_, filtered) = app.get("/api/files?subject=math").await;
    let filtered = filtered.as_object().unwrap();
    assert_eq!(filtered.len(), 1);
    assert!(filtered.contains_key("math"));
}

#[tokio::test]
async fn test_serve_uploaded_blob() {
    let app = TestApp::new();
    let file = app.upload_pdf("Download").await;
    let url = file["blob"]["url"].as_str().unwrap();

    let req = Request::builder().uri(url).body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], PDF_BYTES);

    let (status, body) = app.get("/uploads/missing.pdf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_teacher_login() {
    let app = TestApp::new();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/teacher-login",
            json!({"username": "Riyaziyyat", "password": "pass1234"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "subject": "math"}));

    let (status, body) = app
        .json(
            Method::POST,
            "/api/teacher-login",
            json!({"username": "Riyaziyyat", "password": "wrong"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_module_login() {
    let app = TestApp::new();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/module-login",
            json!({"subject": "math", "username": "riyaziyyat", "password": "pass1234"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, _) = app
        .json(
            Method::POST,
            "/api/module-login",
            json!({"subject": "math", "username": "tarix", "password": "pass1234"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_password_flow() {
    let app = TestApp::new();

    let (status, _) = app
        .json(
            Method::POST,
            "/api/update-password",
            json!({"teacher": "Tarix", "currentPassword": "bad", "newPassword": "newpass"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/update-password",
            json!({"teacher": "Tarix", "currentPassword": "pass1234", "newPassword": "newpass"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/teacher-login",
            json!({"username": "Tarix", "password": "newpass"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/teacher-login",
            json!({"username": "Tarix", "password": "pass1234"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_account_listings_are_redacted() {
    let app = TestApp::new();

    let (status, teachers) = app.get("/api/teachers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(teachers.as_array().unwrap().len(), 10);
    assert!(teachers
        .as_array()
        .unwrap()
        .contains(&json!({"username": "Riyaziyyat", "subject": "math"})));

    let (_, modules) = app.get("/api/modules").await;
    assert!(modules
        .as_array()
        .unwrap()
        .contains(&json!({"subject": "math", "username": "riyaziyyat"})));

    for body in [teachers, modules] {
        let text = body.to_string();
        assert!(!text.contains("password"));
        assert!(!text.contains("pbkdf2"));
    }
}

// ============================================================================
// Envelope
// ============================================================================

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let app = TestApp::new();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/teacher-login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Malformed JSON in request body");
}

#[tokio::test]
async fn test_health_and_index() {
    let dir = tempfile::tempdir().unwrap();
    let router = super::create_router(test_state(&dir));

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
