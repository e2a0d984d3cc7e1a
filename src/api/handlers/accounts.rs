use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{Ack, ApiError, AppJson};
use crate::storage::models::{ModuleSummary, TeacherSummary};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TeacherLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeacherLoginResponse {
    pub success: bool,
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct ModuleLoginRequest {
    pub subject: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub teacher: String,
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn teacher_login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<TeacherLoginRequest>,
) -> Result<Json<TeacherLoginResponse>, ApiError> {
    match state.db.verify_teacher(&req.username, &req.password)? {
        Some(subject) => {
            tracing::info!(username = %req.username, subject = %subject, "Teacher logged in");
            Ok(Json(TeacherLoginResponse {
                success: true,
                subject,
            }))
        }
        None => {
            tracing::warn!(username = %req.username, "Rejected teacher login");
            Err(ApiError::unauthorized("Invalid username or password"))
        }
    }
}

pub async fn module_login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ModuleLoginRequest>,
) -> Result<Json<Ack>, ApiError> {
    if !state
        .db
        .verify_module(&req.subject, &req.username, &req.password)?
    {
        tracing::warn!(subject = %req.subject, username = %req.username, "Rejected module login");
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    tracing::info!(subject = %req.subject, "Module logged in");
    Ok(Ack::ok())
}

pub async fn update_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<UpdatePasswordRequest>,
) -> Result<Json<Ack>, ApiError> {
    if req.new_password.is_empty() {
        return Err(ApiError::bad_request("newPassword must not be empty"));
    }

    if !state
        .db
        .update_teacher_password(&req.teacher, &req.current_password, &req.new_password)?
    {
        tracing::warn!(teacher = %req.teacher, "Rejected password change");
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    tracing::info!(teacher = %req.teacher, "Password changed");
    Ok(Ack::ok())
}

/// Teacher accounts (username and subject only).
pub async fn list_teachers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TeacherSummary>>, ApiError> {
    Ok(Json(state.db.list_teachers()?))
}

/// Module accounts (subject and username only).
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ModuleSummary>>, ApiError> {
    Ok(Json(state.db.list_modules()?))
}
