//! course-share - file registry and credential store for course materials
//!
//! Teachers upload PDF/Word materials into per-subject lecture, colloquium and
//! seminar buckets; students list and download them. This crate provides:
//! - redb-backed registry and credential store (hashed passwords)
//! - Swappable blob handling (uploads directory or inline data URLs)
//! - JSON REST API with multipart upload support

pub mod api;
pub mod config;
pub mod object_store;
pub mod password;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    /// Uploads directory backend; `None` when blobs are stored inline.
    pub object_store: Option<Arc<dyn object_store::ObjectStore>>,
}
