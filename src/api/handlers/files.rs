use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::response::{Ack, ApiError, AppJson, AppQuery};
use crate::config::BlobStorage;
use crate::storage::models::{
    FileRecord, FileType, Module, Registry, StoredBlob, SubjectBucket, UnknownModule,
    UPLOADS_PATH,
};
use crate::AppState;

const REJECTED_TYPE: &str = "Only PDF and Word documents (.pdf, .doc, .docx) can be uploaded";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub file: FileRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFilenameRequest {
    pub file_id: String,
    pub subject: String,
    pub module: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileRequest {
    pub file_id: String,
    pub subject: String,
    pub module: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    #[serde(alias = "name", alias = "displayName")]
    pub new_name: String,
}

/// Fields collected from an upload form.
#[derive(Default)]
struct UploadForm {
    data: Option<Bytes>,
    original_name: Option<String>,
    content_type: Option<String>,
    subject: Option<String>,
    module: Option<String>,
    display_name: Option<String>,
    declared_type: Option<String>,
}

// ============================================================================
// Registry reads
// ============================================================================

pub async fn get_registry(State(state): State<Arc<AppState>>) -> Json<Registry> {
    Json(state.db.load_registry())
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Json<Registry> {
    let mut registry = state.db.load_registry();
    if let Some(subject) = params.subject {
        registry.retain(|key, _| *key == subject);
    }
    Json(registry)
}

/// Files of one bucket. Unknown subjects and modules yield an empty list.
pub async fn list_bucket(
    State(state): State<Arc<AppState>>,
    Path((subject, module)): Path<(String, String)>,
) -> Result<Json<Vec<FileRecord>>, ApiError> {
    let Ok(module) = module.parse::<Module>() else {
        return Ok(Json(Vec::new()));
    };
    let files = state.db.list_bucket(&subject, module)?;
    Ok(Json(files))
}

pub async fn teacher_files(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Result<Json<SubjectBucket>, ApiError> {
    Ok(Json(state.db.get_subject(&subject)?))
}

// ============================================================================
// Upload
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_size = state.config.max_upload_size;
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let original_name = field
                    .file_name()
                    .map(base_name)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| ApiError::bad_request("file must have a file name"))?;
                if extension_type(&original_name).is_none() {
                    return Err(ApiError::bad_request(REJECTED_TYPE));
                }
                form.content_type = field.content_type().map(|s| s.to_string());
                form.original_name = Some(original_name);

                let mut buf = BytesMut::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?
                {
                    if (buf.len() + chunk.len()) as u64 > max_size {
                        return Err(ApiError::payload_too_large(format!(
                            "File exceeds maximum upload size of {max_size} bytes"
                        )));
                    }
                    buf.extend_from_slice(&chunk);
                }
                form.data = Some(buf.freeze());
            }
            "subject" => form.subject = Some(text_field(field, "subject").await?),
            "module" => form.module = Some(text_field(field, "module").await?),
            "displayName" | "name" => {
                form.display_name = Some(text_field(field, "displayName").await?)
            }
            "type" => form.declared_type = Some(text_field(field, "type").await?),
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let data = form
        .data
        .ok_or_else(|| ApiError::bad_request("file field is required"))?;
    let original_name = form.original_name.unwrap_or_default();

    let subject = form
        .subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("subject field is required"))?;
    if !state.db.subject_exists(&subject)? {
        return Err(ApiError::bad_request(format!("Unknown subject '{subject}'")));
    }

    let module = parse_module(
        &form
            .module
            .ok_or_else(|| ApiError::bad_request("module field is required"))?,
    )?;

    let (file_type, mime_type) = classify(
        &original_name,
        form.content_type.as_deref(),
        form.declared_type.as_deref(),
    )?;

    let name = form
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| original_name.clone());

    let now = Utc::now();
    let id = uuid::Uuid::new_v4().to_string();
    let byte_size = data.len() as u64;

    // Phase 1: place the bytes
    let blob = match state.config.storage.blob_storage {
        BlobStorage::Disk => {
            let store = state
                .object_store
                .as_ref()
                .ok_or_else(|| ApiError::internal("Disk blob storage is not configured"))?;
            let stored_name = stored_name(now.timestamp_millis(), &original_name);
            store
                .put(&stored_name, data)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to store file: {e}")))?;
            StoredBlob::Disk {
                url: format!("{UPLOADS_PATH}/{stored_name}"),
                stored_name,
            }
        }
        BlobStorage::Inline => StoredBlob::Inline {
            data_url: format!("data:{mime_type};base64,{}", STANDARD.encode(&data)),
        },
    };

    // Phase 2: record the metadata
    let record = FileRecord {
        id: id.clone(),
        name,
        original_name: original_name.clone(),
        mime_type,
        file_type,
        byte_size,
        blob,
        uploaded_at: now,
    };

    if let Err(e) = state.db.add_file(&subject, module, &record) {
        if let (Some(key), Some(store)) = (record.blob.external_key(), &state.object_store) {
            let _ = store.delete(key).await;
        }
        return Err(e.into());
    }

    tracing::debug!(file_id = %id, subject = %subject, module = %module, "Uploaded file");

    let filename = record
        .blob
        .external_key()
        .map(str::to_string)
        .unwrap_or(original_name);

    Ok(Json(UploadResponse {
        success: true,
        filename,
        file: record,
    }))
}

// ============================================================================
// Rename
// ============================================================================

pub async fn update_filename(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<UpdateFilenameRequest>,
) -> Result<Json<Ack>, ApiError> {
    let module = parse_module(&req.module)?;
    let new_name = validate_name(&req.new_name)?;

    if !state
        .db
        .rename_file(&req.subject, module, &req.file_id, new_name)?
    {
        return Err(ApiError::not_found("File not found"));
    }

    tracing::debug!(file_id = %req.file_id, "Renamed file");
    Ok(Ack::ok())
}

pub async fn update_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateFileRequest>,
) -> Result<Json<Ack>, ApiError> {
    let new_name = validate_name(&req.new_name)?;

    let location = state
        .db
        .find_file(&id)?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if !state
        .db
        .rename_file(&location.subject, location.module, &id, new_name)?
    {
        return Err(ApiError::not_found("File not found"));
    }

    tracing::debug!(file_id = %id, "Renamed file");
    Ok(Ack::ok())
}

// ============================================================================
// Delete
// ============================================================================

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<DeleteFileRequest>,
) -> Result<Json<Ack>, ApiError> {
    let module = parse_module(&req.module)?;

    if !remove_file(&state, &req.subject, module, &req.file_id).await? {
        return Err(ApiError::not_found("File not found"));
    }
    Ok(Ack::ok())
}

pub async fn delete_file_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    let location = state
        .db
        .find_file(&id)?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if !remove_file(&state, &location.subject, location.module, &id).await? {
        return Err(ApiError::not_found("File not found"));
    }
    Ok(Ack::ok())
}

/// Remove a record, then its blob if stored externally. Returns false if the
/// record did not exist. Blob removal failures are logged only.
async fn remove_file(
    state: &AppState,
    subject: &str,
    module: Module,
    id: &str,
) -> Result<bool, ApiError> {
    // Phase 1: remove metadata
    let Some(file) = state.db.remove_file(subject, module, id)? else {
        return Ok(false);
    };

    // Phase 2: remove the blob (best-effort)
    if let Some(key) = file.blob.external_key() {
        match &state.object_store {
            Some(store) => {
                if let Err(e) = store.delete(key).await {
                    tracing::warn!(file_id = %id, key, error = %e, "Failed to delete blob");
                }
            }
            None => tracing::warn!(file_id = %id, key, "No disk store configured, blob left"),
        }
    }

    tracing::debug!(file_id = %id, subject, module = %module, "Deleted file");
    Ok(true)
}

// ============================================================================
// Helpers
// ============================================================================

async fn text_field(field: Field<'_>, label: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid {label}: {e}")))
}

fn parse_module(raw: &str) -> Result<Module, ApiError> {
    raw.parse()
        .map_err(|e: UnknownModule| ApiError::bad_request(e.to_string()))
}

fn validate_name(raw: &str) -> Result<&str, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("newName must not be empty"));
    }
    Ok(name)
}

/// Last path segment of a client-supplied file name.
fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim().to_string()
}

fn extension_type(name: &str) -> Option<FileType> {
    FsPath::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FileType::from_extension)
}

/// Decide the file type and MIME type of an upload, rejecting anything that
/// is not a PDF or Word document. A declared MIME type (part header or `type`
/// field) must agree with the extension unless it is the generic
/// `application/octet-stream`.
fn classify(
    original_name: &str,
    content_type: Option<&str>,
    declared_type: Option<&str>,
) -> Result<(FileType, String), ApiError> {
    let file_type =
        extension_type(original_name).ok_or_else(|| ApiError::bad_request(REJECTED_TYPE))?;

    let declared = [content_type, declared_type]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && !ct.eq_ignore_ascii_case("application/octet-stream"));

    let mut mime_type = None;
    for ct in declared {
        match FileType::from_mime(ct) {
            Some(t) if t == file_type => {
                mime_type.get_or_insert_with(|| ct.to_lowercase());
            }
            _ => return Err(ApiError::bad_request(REJECTED_TYPE)),
        }
    }

    let mime_type = mime_type
        .or_else(|| {
            mime_guess::from_path(original_name)
                .iter()
                .map(|m| m.essence_str().to_string())
                .find(|m| FileType::from_mime(m) == Some(file_type))
        })
        .unwrap_or_else(|| file_type.mime_for(original_name).to_string());

    Ok((file_type, mime_type))
}

/// Generated blob name: `<millis>-<random><.ext>`.
fn stored_name(millis: i64, original_name: &str) -> String {
    let suffix = uuid::Uuid::new_v4().as_u128() % 1_000_000_000;
    let ext = FsPath::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();
    format!("{millis}-{suffix}{ext}")
}
