//! Accounts and subjects seeded into an empty database.

use super::models::{Registry, SubjectBucket};

/// Password given to every seeded account.
pub const DEFAULT_PASSWORD: &str = "pass1234";

/// The ten subject codes served out of the box.
pub const SUBJECT_CODES: [&str; 10] = [
    "transport",
    "computer",
    "math",
    "economics",
    "azerbaijani",
    "english",
    "physical",
    "pedagogy",
    "agriculture",
    "history",
];

/// (teacher username, subject)
pub const TEACHER_ACCOUNTS: [(&str, &str); 10] = [
    ("Neqliyyat", "transport"),
    ("Kompyuter sistemleri", "computer"),
    ("Riyaziyyat", "math"),
    ("Iqtisadiyyat", "economics"),
    ("Azerbaycan dili", "azerbaijani"),
    ("Ingilis dili", "english"),
    ("Fiziki terbiye", "physical"),
    ("Pedaqogika", "pedagogy"),
    ("Kend teserrufati", "agriculture"),
    ("Tarix", "history"),
];

/// (subject, module account username)
pub const MODULE_LOGINS: [(&str, &str); 10] = [
    ("transport", "neqliyyat"),
    ("computer", "kompyuter"),
    ("math", "riyaziyyat"),
    ("economics", "iqtisadiyyat"),
    ("azerbaijani", "azdili"),
    ("english", "ingilisdili"),
    ("physical", "fiziki"),
    ("pedagogy", "pedagogiya"),
    ("agriculture", "kend"),
    ("history", "tarix"),
];

/// A registry with every default subject present and all buckets empty.
pub fn default_registry() -> Registry {
    SUBJECT_CODES
        .iter()
        .map(|s| (s.to_string(), SubjectBucket::default()))
        .collect()
}
