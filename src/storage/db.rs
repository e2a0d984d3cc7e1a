use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::defaults;
use super::models::{ModuleCredential, SubjectBucket, TeacherCredential};
use super::tables::*;
use crate::password::{PasswordError, PasswordHasher};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

/// Registry and credential store.
///
/// Every operation runs in a single redb transaction. redb admits one write
/// transaction at a time, so concurrent mutations of the same bucket are
/// serialized rather than overwriting each other.
pub struct Database {
    db: Arc<RedbDatabase>,
    hasher: PasswordHasher,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            hasher: self.hasher,
        }
    }
}

impl Database {
    /// Open or create a database in `data_dir`, seeding the default subjects
    /// and accounts when the store is empty.
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        hasher: PasswordHasher,
    ) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("course-share.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SUBJECTS)?;
            let _ = write_txn.open_table(TEACHERS)?;
            let _ = write_txn.open_table(MODULE_ACCOUNTS)?;
        }
        write_txn.commit()?;

        let database = Self { db, hasher };
        database.seed_defaults()?;
        Ok(database)
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    /// Populate each empty table with its defaults. Tables that already hold
    /// data are left alone.
    fn seed_defaults(&self) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        let mut seeded = false;
        {
            let mut subjects = write_txn.open_table(SUBJECTS)?;
            if subjects.iter()?.next().is_none() {
                let empty = rmp_serde::to_vec_named(&SubjectBucket::default())?;
                for subject in defaults::SUBJECT_CODES {
                    subjects.insert(subject, empty.as_slice())?;
                }
                seeded = true;
            }

            let mut teachers = write_txn.open_table(TEACHERS)?;
            if teachers.iter()?.next().is_none() {
                for (username, subject) in defaults::TEACHER_ACCOUNTS {
                    let credential = TeacherCredential {
                        password_hash: self.hasher.hash(defaults::DEFAULT_PASSWORD)?,
                        subject: subject.to_string(),
                    };
                    let data = rmp_serde::to_vec_named(&credential)?;
                    teachers.insert(username, data.as_slice())?;
                }
                seeded = true;
            }

            let mut modules = write_txn.open_table(MODULE_ACCOUNTS)?;
            if modules.iter()?.next().is_none() {
                for (subject, username) in defaults::MODULE_LOGINS {
                    let credential = ModuleCredential {
                        username: username.to_string(),
                        password_hash: self.hasher.hash(defaults::DEFAULT_PASSWORD)?,
                    };
                    let data = rmp_serde::to_vec_named(&credential)?;
                    modules.insert(subject, data.as_slice())?;
                }
                seeded = true;
            }
        }
        write_txn.commit()?;

        if seeded {
            tracing::info!("Seeded default subjects and accounts");
        }
        Ok(())
    }
}

/// Decode the msgpack value stored under `key`, if any.
pub(super) fn read_value<T, V>(table: &T, key: &str) -> Result<Option<V>, DatabaseError>
where
    T: ReadableTable<&'static str, &'static [u8]>,
    V: serde::de::DeserializeOwned,
{
    match table.get(key)? {
        Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
        None => Ok(None),
    }
}

/// Decode every entry of a table in key order.
pub(super) fn read_all<T, V>(table: &T) -> Result<Vec<(String, V)>, DatabaseError>
where
    T: ReadableTable<&'static str, &'static [u8]>,
    V: serde::de::DeserializeOwned,
{
    let mut entries = Vec::new();
    for result in table.iter()? {
        let (key, value) = result?;
        entries.push((key.value().to_string(), rmp_serde::from_slice(value.value())?));
    }
    Ok(entries)
}
