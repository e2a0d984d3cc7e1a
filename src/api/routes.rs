use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::storage::models::UPLOADS_PATH;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.upload_body_limit();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let router = Router::new()
        .route("/", get(handlers::index))
        .route("/api/health", get(handlers::health))
        // Registry
        .route("/api/data", get(handlers::get_registry))
        .route("/api/files", get(handlers::list_files))
        .route("/api/files/:subject/:module", get(handlers::list_bucket))
        .route(
            "/api/files/:id",
            put(handlers::update_file).delete(handlers::delete_file_by_id),
        )
        .route("/api/teacher-files/:subject", get(handlers::teacher_files))
        .route(
            "/api/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/update-filename", post(handlers::update_filename))
        .route("/api/delete-file", post(handlers::delete_file))
        // Accounts
        .route("/api/teachers", get(handlers::list_teachers))
        .route("/api/modules", get(handlers::list_modules))
        .route("/api/teacher-login", post(handlers::teacher_login))
        .route("/api/module-login", post(handlers::module_login))
        .route("/api/update-password", post(handlers::update_password));

    // Uploaded blobs exist only with the disk backend
    let router = if state.object_store.is_some() {
        router.route(
            &format!("{UPLOADS_PATH}/*name"),
            get(handlers::serve_upload),
        )
    } else {
        router
    };

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
