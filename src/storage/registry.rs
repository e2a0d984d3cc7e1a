use redb::ReadableTable;

use super::db::{read_all, read_value, Database, DatabaseError};
use super::defaults;
use super::models::{FileLocation, FileRecord, Module, Registry, SubjectBucket};
use super::tables::*;

impl Database {
    // ========================================================================
    // Whole-registry operations
    // ========================================================================

    /// Read the full registry. Falls back to the default layout (all default
    /// subjects, empty buckets) if the store cannot be read.
    pub fn load_registry(&self) -> Registry {
        match self.try_load_registry() {
            Ok(registry) => registry,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load registry, using defaults");
                defaults::default_registry()
            }
        }
    }

    fn try_load_registry(&self) -> Result<Registry, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBJECTS)?;
        Ok(read_all::<_, SubjectBucket>(&table)?.into_iter().collect())
    }

    /// Replace the stored registry with `registry`. Returns false (and logs)
    /// on failure.
    pub fn save_registry(&self, registry: &Registry) -> bool {
        match self.try_save_registry(registry) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to save registry");
                false
            }
        }
    }

    fn try_save_registry(&self, registry: &Registry) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SUBJECTS)?;
            let stale: Vec<String> = table
                .iter()?
                .map(|r| r.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in stale.iter().filter(|k| !registry.contains_key(*k)) {
                table.remove(key.as_str())?;
            }
            for (subject, bucket) in registry {
                let data = rmp_serde::to_vec_named(bucket)?;
                table.insert(subject.as_str(), data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    // ========================================================================
    // Bucket reads
    // ========================================================================

    /// Whether `subject` has buckets in the registry.
    pub fn subject_exists(&self, subject: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBJECTS)?;
        Ok(table.get(subject)?.is_some())
    }

    /// The three buckets of `subject`, empty if the subject is unknown.
    pub fn get_subject(&self, subject: &str) -> Result<SubjectBucket, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBJECTS)?;
        Ok(read_value(&table, subject)?.unwrap_or_default())
    }

    /// Files of one module in insertion order, empty if the subject is unknown.
    pub fn list_bucket(
        &self,
        subject: &str,
        module: Module,
    ) -> Result<Vec<FileRecord>, DatabaseError> {
        let mut bucket = self.get_subject(subject)?;
        Ok(std::mem::take(bucket.files_mut(module)))
    }

    /// Locate a file by id alone (first match in subject, then module order).
    pub fn find_file(&self, id: &str) -> Result<Option<FileLocation>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBJECTS)?;

        for (subject, bucket) in read_all::<_, SubjectBucket>(&table)? {
            for module in Module::ALL {
                if let Some(file) = bucket.files(module).iter().find(|f| f.id == id) {
                    return Ok(Some(FileLocation {
                        subject,
                        module,
                        file: file.clone(),
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Number of file records across all subjects.
    pub fn file_count(&self) -> Result<usize, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBJECTS)?;
        Ok(read_all::<_, SubjectBucket>(&table)?
            .iter()
            .map(|(_, bucket)| bucket.len())
            .sum())
    }

    // ========================================================================
    // Bucket mutations
    // ========================================================================

    /// Append `file` to a bucket, creating the subject if needed.
    pub fn add_file(
        &self,
        subject: &str,
        module: Module,
        file: &FileRecord,
    ) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");

        self.update_bucket(subject, true, |bucket| {
            bucket.files_mut(module).push(file.clone());
            Some(())
        })?;
        Ok(())
    }

    /// Set the display name of the first file in the bucket with `id`.
    /// Returns false if no such file exists.
    pub fn rename_file(
        &self,
        subject: &str,
        module: Module,
        id: &str,
        new_name: &str,
    ) -> Result<bool, DatabaseError> {
        let renamed = self.update_bucket(subject, false, |bucket| {
            let file = bucket.files_mut(module).iter_mut().find(|f| f.id == id)?;
            file.name = new_name.to_string();
            Some(())
        })?;
        Ok(renamed.is_some())
    }

    /// Remove the first file in the bucket with `id`, returning it.
    /// Blob cleanup is left to the caller.
    pub fn remove_file(
        &self,
        subject: &str,
        module: Module,
        id: &str,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        self.update_bucket(subject, false, |bucket| {
            let files = bucket.files_mut(module);
            let index = files.iter().position(|f| f.id == id)?;
            Some(files.remove(index))
        })
    }

    /// Read-modify-write one subject inside a single write transaction.
    /// Nothing is written when `mutate` returns `None`.
    fn update_bucket<R>(
        &self,
        subject: &str,
        create: bool,
        mutate: impl FnOnce(&mut SubjectBucket) -> Option<R>,
    ) -> Result<Option<R>, DatabaseError> {
        let write_txn = self.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(SUBJECTS)?;
            let existing: Option<SubjectBucket> = read_value(&table, subject)?;

            let mut bucket = match existing {
                Some(bucket) => bucket,
                None if create => SubjectBucket::default(),
                None => return Ok(None),
            };

            match mutate(&mut bucket) {
                Some(result) => {
                    let data = rmp_serde::to_vec_named(&bucket)?;
                    table.insert(subject, data.as_slice())?;
                    Some(result)
                }
                None => None,
            }
        };

        if result.is_some() {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(result)
    }
}
