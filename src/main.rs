use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_share::{
    api,
    config::{BlobStorage, Config},
    object_store::{LocalStore, ObjectStore},
    password::PasswordHasher,
    storage::Database,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "course-share starting");

    let config = Config::load()?;

    // Initialize database
    let hasher = PasswordHasher::new(config.password_iterations);
    let db = Database::open(&config.server.data_dir, hasher)?;
    info!("Database opened at: {}", config.server.data_dir);

    if let Some(path) = &config.legacy_data_file {
        import_legacy(&db, path);
    }

    // Initialize blob storage
    let object_store: Option<Arc<dyn ObjectStore>> = match config.storage.blob_storage {
        BlobStorage::Disk => {
            info!("Storing uploads on disk at: {}", config.storage.uploads_dir);
            Some(Arc::new(LocalStore::new(&config.storage.uploads_dir)?))
        }
        BlobStorage::Inline => {
            info!("Storing uploads inline as data URLs, /uploads is not served");
            None
        }
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        object_store,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Import a legacy JSON document into a registry that has no files yet.
/// Failures are logged and startup continues with the current contents.
fn import_legacy(db: &Database, path: &str) {
    match db.file_count() {
        Ok(0) => {}
        Ok(count) => {
            info!(files = count, "Registry already populated, skipping legacy import");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to inspect registry, skipping legacy import");
            return;
        }
    }

    if !std::path::Path::new(path).exists() {
        tracing::warn!(path, "Legacy data file not found, skipping import");
        return;
    }

    if let Err(e) = db.import_legacy_file(path) {
        tracing::error!(path, error = %e, "Failed to import legacy data file");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
