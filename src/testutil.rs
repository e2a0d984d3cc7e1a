//! Shared test helpers for course-share unit tests.

use std::sync::Arc;

use crate::config::{BlobStorage, Config, ServerConfig, StorageConfig};
use crate::object_store::{LocalStore, ObjectStore};
use crate::password::PasswordHasher;
use crate::storage::Database;
use crate::AppState;

/// Cheap hashing keeps seeding fast in tests.
pub const TEST_ITERATIONS: u32 = 2;

/// Create a test AppState with a temporary database and uploads directory.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with(temp_dir, BlobStorage::Disk)
}

pub fn test_state_with(
    temp_dir: &tempfile::TempDir,
    blob_storage: BlobStorage,
) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let uploads_dir = temp_dir.path().join("uploads");

    let config = Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            blob_storage,
            uploads_dir: uploads_dir.to_string_lossy().to_string(),
        },
        password_iterations: TEST_ITERATIONS,
        ..Config::default()
    };

    let db = Database::open(&data_dir, PasswordHasher::new(TEST_ITERATIONS))
        .expect("Failed to open test database");
    let object_store: Option<Arc<dyn ObjectStore>> = match blob_storage {
        BlobStorage::Disk => Some(Arc::new(
            LocalStore::new(&uploads_dir).expect("Failed to create test uploads dir"),
        )),
        BlobStorage::Inline => None,
    };

    Arc::new(AppState {
        config,
        db,
        object_store,
    })
}
