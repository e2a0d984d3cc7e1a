use axum::Json;
use chrono::Utc;
use serde::Serialize;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub version: String,
    pub timestamp: String,
    pub features: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "course-share backend is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        features: ["file upload", "sharing", "teacher and module accounts"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
