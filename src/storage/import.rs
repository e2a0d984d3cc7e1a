use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};

use super::db::{Database, DatabaseError};
use super::models::{
    FileRecord, FileType, LegacyDocument, LegacyFileRecord, Module, ModuleCredential,
    StoredBlob, SubjectBucket, TeacherCredential, UPLOADS_PATH,
};
use super::tables::*;

/// Counts from a legacy import.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub subjects: usize,
    pub files: usize,
    /// Entries with no usable blob reference or an unrecognized type.
    pub skipped: usize,
    pub teachers: usize,
    pub modules: usize,
}

impl Database {
    /// Read and import a single-file JSON document (`{files, credentials}`).
    pub fn import_legacy_file<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ImportStats, DatabaseError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let document: LegacyDocument = serde_json::from_str(&raw)?;
        self.import_legacy(&document)
    }

    /// Replace the buckets of every subject named in `document` and upsert its
    /// accounts, all in one write transaction. Plaintext passwords are hashed
    /// on the way in.
    pub fn import_legacy(
        &self,
        document: &LegacyDocument,
    ) -> Result<ImportStats, DatabaseError> {
        let mut stats = ImportStats::default();

        let mut buckets = Vec::with_capacity(document.files.len());
        for (subject, legacy) in &document.files {
            let mut bucket = SubjectBucket::default();
            for module in Module::ALL {
                for entry in legacy.files(module) {
                    match convert_record(entry) {
                        Some(record) => bucket.files_mut(module).push(record),
                        None => {
                            tracing::warn!(
                                subject = %subject,
                                module = %module,
                                id = ?entry.id,
                                "Skipping legacy file entry without a usable blob or type"
                            );
                            stats.skipped += 1;
                        }
                    }
                }
            }
            stats.files += bucket.len();
            buckets.push((subject.as_str(), bucket));
        }

        let teachers = document
            .credentials
            .teachers
            .iter()
            .map(|(username, teacher)| {
                let credential = TeacherCredential {
                    password_hash: self.hasher().hash(&teacher.password)?,
                    subject: teacher.subject.clone(),
                };
                Ok((username.as_str(), credential))
            })
            .collect::<Result<Vec<_>, DatabaseError>>()?;

        let modules = document
            .credentials
            .modules
            .iter()
            .map(|(subject, module)| {
                let credential = ModuleCredential {
                    username: module.username.clone(),
                    password_hash: self.hasher().hash(&module.password)?,
                };
                Ok((subject.as_str(), credential))
            })
            .collect::<Result<Vec<_>, DatabaseError>>()?;

        let write_txn = self.begin_write()?;
        {
            let mut subjects = write_txn.open_table(SUBJECTS)?;
            for (subject, bucket) in &buckets {
                let data = rmp_serde::to_vec_named(bucket)?;
                subjects.insert(*subject, data.as_slice())?;
            }

            let mut teacher_table = write_txn.open_table(TEACHERS)?;
            for (username, credential) in &teachers {
                let data = rmp_serde::to_vec_named(credential)?;
                teacher_table.insert(*username, data.as_slice())?;
            }

            let mut module_table = write_txn.open_table(MODULE_ACCOUNTS)?;
            for (subject, credential) in &modules {
                let data = rmp_serde::to_vec_named(credential)?;
                module_table.insert(*subject, data.as_slice())?;
            }
        }
        write_txn.commit()?;

        stats.subjects = buckets.len();
        stats.teachers = teachers.len();
        stats.modules = modules.len();

        tracing::info!(
            subjects = stats.subjects,
            files = stats.files,
            skipped = stats.skipped,
            teachers = stats.teachers,
            modules = stats.modules,
            "Imported legacy document"
        );
        Ok(stats)
    }
}

/// Build a record from a legacy entry. Returns `None` when the entry points
/// at no blob or its type cannot be told.
fn convert_record(entry: &LegacyFileRecord) -> Option<FileRecord> {
    let data_url = [&entry.data, &entry.url, &entry.filename, &entry.path]
        .into_iter()
        .flatten()
        .find(|r| r.starts_with("data:"))
        .cloned();
    let stored_name = [&entry.filename, &entry.path, &entry.url]
        .into_iter()
        .flatten()
        .filter(|r| !r.starts_with("data:"))
        .map(|r| file_name_of(r.as_str()))
        .find(|n| !n.is_empty());

    let original_name = non_empty(&entry.original_name)
        .or_else(|| stored_name.clone())
        .or_else(|| non_empty(&entry.name))
        .unwrap_or_default();

    let file_type = entry
        .kind
        .as_deref()
        .and_then(parse_kind)
        .or_else(|| entry.mime_type.as_deref().and_then(FileType::from_mime))
        .or_else(|| extension_type(&original_name))
        .or_else(|| stored_name.as_deref().and_then(extension_type))?;

    let blob = match (entry.blob.clone(), data_url, stored_name) {
        (Some(blob), _, _) => blob,
        (None, Some(data_url), _) => StoredBlob::Inline { data_url },
        (None, None, Some(stored_name)) => StoredBlob::Disk {
            url: format!("{UPLOADS_PATH}/{stored_name}"),
            stored_name,
        },
        (None, None, None) => return None,
    };

    let mime_type = entry
        .mime_type
        .clone()
        .filter(|m| FileType::from_mime(m) == Some(file_type))
        .unwrap_or_else(|| file_type.mime_for(&original_name).to_string());

    let id = match &entry.id {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    };

    let uploaded_at = entry
        .upload_date
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| {
            id.parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        })
        .unwrap_or_else(Utc::now);

    let name = non_empty(&entry.display_name)
        .or_else(|| non_empty(&entry.name))
        .unwrap_or_else(|| original_name.clone());

    Some(FileRecord {
        id,
        name,
        original_name,
        mime_type,
        file_type,
        byte_size: entry.size.unwrap_or(0),
        blob,
        uploaded_at,
    })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn file_name_of(reference: &str) -> String {
    reference
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(reference)
        .trim()
        .to_string()
}

/// The `type` field held either a short label or a MIME type.
fn parse_kind(kind: &str) -> Option<FileType> {
    match kind.trim().to_lowercase().as_str() {
        "pdf" => Some(FileType::Pdf),
        "word" | "doc" | "docx" => Some(FileType::Word),
        other => FileType::from_mime(other),
    }
}

fn extension_type(name: &str) -> Option<FileType> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FileType::from_extension)
}
