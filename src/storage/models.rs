use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content category within a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Colloquium,
    Lecture,
    Seminar,
}

impl Module {
    pub const ALL: [Module; 3] = [Module::Lecture, Module::Colloquium, Module::Seminar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Colloquium => "colloquium",
            Module::Lecture => "lecture",
            Module::Seminar => "seminar",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModule(pub String);

impl fmt::Display for UnknownModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown module '{}' (expected lecture, colloquium or seminar)",
            self.0
        )
    }
}

impl std::error::Error for UnknownModule {}

impl FromStr for Module {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "colloquium" => Ok(Module::Colloquium),
            "lecture" => Ok(Module::Lecture),
            "seminar" => Ok(Module::Seminar),
            _ => Err(UnknownModule(s.to_string())),
        }
    }
}

/// Classification of an accepted upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Word,
}

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Public path prefix under which disk blobs are served.
pub const UPLOADS_PATH: &str = "/uploads";

impl FileType {
    /// Classify by file extension (case-insensitive, with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "doc" | "docx" => Some(FileType::Word),
            _ => None,
        }
    }

    /// Classify by MIME type. Parameters such as `; charset=...` are ignored.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next().unwrap_or("").trim();
        match essence.to_lowercase().as_str() {
            MIME_PDF => Some(FileType::Pdf),
            MIME_DOC | MIME_DOCX => Some(FileType::Word),
            _ => None,
        }
    }

    /// Canonical MIME type for a file of this type named `file_name`.
    pub fn mime_for(self, file_name: &str) -> &'static str {
        match self {
            FileType::Pdf => MIME_PDF,
            FileType::Word if file_name.to_lowercase().ends_with(".docx") => MIME_DOCX,
            FileType::Word => MIME_DOC,
        }
    }
}

/// Where the bytes of an uploaded file live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoredBlob {
    /// Written to the uploads directory under a generated name.
    #[serde(rename_all = "camelCase")]
    Disk { stored_name: String, url: String },
    /// Embedded as a `data:` URL.
    #[serde(rename_all = "camelCase")]
    Inline { data_url: String },
}

impl StoredBlob {
    /// Object store key, if the blob lives outside the record.
    pub fn external_key(&self) -> Option<&str> {
        match self {
            StoredBlob::Disk { stored_name, .. } => Some(stored_name),
            StoredBlob::Inline { .. } => None,
        }
    }
}

/// One uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    /// Display name; the only field that changes after upload.
    #[serde(alias = "displayName")]
    pub name: String,
    pub original_name: String,
    pub mime_type: String,
    pub file_type: FileType,
    pub byte_size: u64,
    pub blob: StoredBlob,
    pub uploaded_at: DateTime<Utc>,
}

/// The three module lists of one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectBucket {
    #[serde(default)]
    pub lecture: Vec<FileRecord>,
    #[serde(default)]
    pub colloquium: Vec<FileRecord>,
    #[serde(default)]
    pub seminar: Vec<FileRecord>,
}

impl SubjectBucket {
    pub fn files(&self, module: Module) -> &Vec<FileRecord> {
        match module {
            Module::Colloquium => &self.colloquium,
            Module::Lecture => &self.lecture,
            Module::Seminar => &self.seminar,
        }
    }

    pub fn files_mut(&mut self, module: Module) -> &mut Vec<FileRecord> {
        match module {
            Module::Colloquium => &mut self.colloquium,
            Module::Lecture => &mut self.lecture,
            Module::Seminar => &mut self.seminar,
        }
    }

    pub fn len(&self) -> usize {
        Module::ALL.iter().map(|m| self.files(*m).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Subject code -> buckets.
pub type Registry = BTreeMap<String, SubjectBucket>;

/// Stored teacher account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherCredential {
    pub password_hash: String,
    pub subject: String,
}

/// Stored per-subject module account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleCredential {
    pub username: String,
    pub password_hash: String,
}

/// Teacher account as exposed over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherSummary {
    pub username: String,
    pub subject: String,
}

/// Module account as exposed over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub subject: String,
    pub username: String,
}

/// Location of a file found by id alone.
#[derive(Debug, Clone)]
pub struct FileLocation {
    pub subject: String,
    pub module: Module,
    pub file: FileRecord,
}

// ============================================================================
// Legacy JSON document
// ============================================================================

/// Single-document layout used by the earlier JSON-file backend.
/// Passwords in it are plaintext.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyDocument {
    #[serde(default)]
    pub files: BTreeMap<String, LegacyBucket>,
    #[serde(default)]
    pub credentials: LegacyCredentials,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyBucket {
    pub lecture: Vec<LegacyFileRecord>,
    pub colloquium: Vec<LegacyFileRecord>,
    pub seminar: Vec<LegacyFileRecord>,
}

impl LegacyBucket {
    pub fn files(&self, module: Module) -> &Vec<LegacyFileRecord> {
        match module {
            Module::Colloquium => &self.colloquium,
            Module::Lecture => &self.lecture,
            Module::Seminar => &self.seminar,
        }
    }
}

/// A file entry as the JSON backend wrote it. Revisions of that backend
/// disagreed on field names, so everything is optional and the import fills
/// the gaps from whatever is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyFileRecord {
    /// Millisecond timestamp (number or string) in most documents.
    pub id: Option<serde_json::Value>,
    pub name: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(alias = "originalName", alias = "originalname")]
    pub original_name: Option<String>,
    #[serde(alias = "storedName")]
    pub filename: Option<String>,
    pub path: Option<String>,
    pub url: Option<String>,
    /// Inline variant: a `data:` URL.
    #[serde(alias = "dataUrl")]
    pub data: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(alias = "mimeType", alias = "mimetype")]
    pub mime_type: Option<String>,
    #[serde(alias = "byteSize")]
    pub size: Option<u64>,
    #[serde(alias = "uploadDate", alias = "uploadedAt", alias = "uploadTimestamp")]
    pub upload_date: Option<String>,
    /// Present when the document was written by this service.
    pub blob: Option<StoredBlob>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyCredentials {
    #[serde(default)]
    pub teachers: BTreeMap<String, LegacyTeacher>,
    #[serde(default)]
    pub modules: BTreeMap<String, LegacyModule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyTeacher {
    pub password: String,
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyModule {
    pub username: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_parses_case_insensitively() {
        assert_eq!("Lecture".parse::<Module>().unwrap(), Module::Lecture);
        assert_eq!(" seminar ".parse::<Module>().unwrap(), Module::Seminar);
        assert!("workshop".parse::<Module>().is_err());
    }

    #[test]
    fn file_type_classification() {
        assert_eq!(FileType::from_extension(".PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_extension("docx"), Some(FileType::Word));
        assert_eq!(FileType::from_extension(".exe"), None);
        assert_eq!(FileType::from_mime(MIME_DOCX), Some(FileType::Word));
        assert_eq!(
            FileType::from_mime("application/pdf; charset=binary"),
            Some(FileType::Pdf)
        );
        assert_eq!(FileType::from_mime("image/png"), None);
    }

    #[test]
    fn record_serializes_camel_case_with_tagged_blob() {
        let record = FileRecord {
            id: "f1".to_string(),
            name: "Week 1".to_string(),
            original_name: "week1.pdf".to_string(),
            mime_type: MIME_PDF.to_string(),
            file_type: FileType::Pdf,
            byte_size: 3,
            blob: StoredBlob::Disk {
                stored_name: "1-2.pdf".to_string(),
                url: "/uploads/1-2.pdf".to_string(),
            },
            uploaded_at: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["originalName"], "week1.pdf");
        assert_eq!(json["fileType"], "pdf");
        assert_eq!(json["blob"]["kind"], "disk");
        assert_eq!(json["blob"]["storedName"], "1-2.pdf");
    }
}
