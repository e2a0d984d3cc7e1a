use thiserror::Error;

use crate::password::DEFAULT_ITERATIONS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    /// Maximum size of an uploaded file in bytes
    pub max_upload_size: u64,
    /// PBKDF2 iterations for newly hashed passwords
    pub password_iterations: u32,
    /// JSON document to import when the registry holds no files
    pub legacy_data_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobStorage {
    /// Bytes written under the uploads directory and served from `/uploads`.
    Disk,
    /// Bytes embedded in the file record as a base64 data URL.
    Inline,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub blob_storage: BlobStorage,
    /// Directory for the disk blob backend
    pub uploads_dir: String,
}

pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_storage: BlobStorage::Disk,
            uploads_dir: "./uploads".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            password_iterations: DEFAULT_ITERATIONS,
            legacy_data_file: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address = lookup("BIND_ADDRESS").unwrap_or_else(|| {
            let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{port}")
        });

        let data_dir = lookup("DATA_DIR").unwrap_or_else(|| "./data".to_string());
        let uploads_dir = lookup("UPLOADS_DIR").unwrap_or_else(|| "./uploads".to_string());

        let blob_storage = match lookup("BLOB_STORAGE")
            .unwrap_or_else(|| "disk".to_string())
            .to_lowercase()
            .as_str()
        {
            "disk" => BlobStorage::Disk,
            "inline" => BlobStorage::Inline,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "BLOB_STORAGE must be 'disk' or 'inline', got '{other}'"
                )))
            }
        };

        let max_upload_size = lookup("MAX_UPLOAD_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE);

        let password_iterations = lookup("PASSWORD_ITERATIONS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ITERATIONS);

        let legacy_data_file = lookup("LEGACY_DATA_FILE").filter(|s| !s.trim().is_empty());

        let config = Config {
            server: ServerConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                blob_storage,
                uploads_dir,
            },
            max_upload_size,
            password_iterations,
            legacy_data_file,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.password_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "PASSWORD_ITERATIONS must be greater than 0".to_string(),
            ));
        }

        if self.password_iterations < 10_000 {
            tracing::warn!(
                "PASSWORD_ITERATIONS is {}. Values below 10000 weaken stored password hashes.",
                self.password_iterations
            );
        }

        Ok(())
    }

    /// Request body limit for the upload route: the file cap plus room for the
    /// multipart framing and text fields.
    pub fn upload_body_limit(&self) -> usize {
        (self.max_upload_size as usize).saturating_add(1024 * 1024)
    }
}
