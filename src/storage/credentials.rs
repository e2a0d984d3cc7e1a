use super::db::{read_all, read_value, Database, DatabaseError};
use super::models::{ModuleCredential, ModuleSummary, TeacherCredential, TeacherSummary};
use super::tables::*;

impl Database {
    // ========================================================================
    // Teacher accounts
    // ========================================================================

    /// Returns the teacher's subject if the username exists and the password
    /// matches.
    pub fn verify_teacher(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(TEACHERS)?;

        let credential: Option<TeacherCredential> = read_value(&table, username)?;
        Ok(credential
            .filter(|c| self.hasher().verify(password, &c.password_hash))
            .map(|c| c.subject))
    }

    /// Replace a teacher's password if `current_password` matches.
    /// Returns false (and leaves the stored hash untouched) otherwise.
    pub fn update_teacher_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(TEACHERS)?;
            let credential: Option<TeacherCredential> = read_value(&table, username)?;

            match credential {
                Some(mut credential)
                    if self
                        .hasher()
                        .verify(current_password, &credential.password_hash) =>
                {
                    credential.password_hash = self.hasher().hash(new_password)?;
                    let data = rmp_serde::to_vec_named(&credential)?;
                    table.insert(username, data.as_slice())?;
                    true
                }
                _ => false,
            }
        };

        if updated {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(updated)
    }

    /// Teacher accounts without password material.
    pub fn list_teachers(&self) -> Result<Vec<TeacherSummary>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(TEACHERS)?;

        Ok(read_all::<_, TeacherCredential>(&table)?
            .into_iter()
            .map(|(username, c)| TeacherSummary {
                username,
                subject: c.subject,
            })
            .collect())
    }

    // ========================================================================
    // Module accounts
    // ========================================================================

    /// Check the single module account of `subject`.
    pub fn verify_module(
        &self,
        subject: &str,
        username: &str,
        password: &str,
    ) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(MODULE_ACCOUNTS)?;

        let credential: Option<ModuleCredential> = read_value(&table, subject)?;
        Ok(credential.is_some_and(|c| {
            c.username == username && self.hasher().verify(password, &c.password_hash)
        }))
    }

    /// Module accounts without password material.
    pub fn list_modules(&self) -> Result<Vec<ModuleSummary>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(MODULE_ACCOUNTS)?;

        Ok(read_all::<_, ModuleCredential>(&table)?
            .into_iter()
            .map(|(subject, c)| ModuleSummary {
                subject,
                username: c.username,
            })
            .collect())
    }
}
