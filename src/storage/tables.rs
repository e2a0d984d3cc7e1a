use redb::TableDefinition;

/// Subject buckets: subject code -> SubjectBucket (msgpack)
pub const SUBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("subjects");

/// Teacher accounts: username -> TeacherCredential (msgpack)
pub const TEACHERS: TableDefinition<&str, &[u8]> = TableDefinition::new("teachers");

/// Module accounts: subject code -> ModuleCredential (msgpack)
pub const MODULE_ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("module_accounts");
