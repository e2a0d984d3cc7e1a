mod credentials;
pub mod db;
pub mod defaults;
mod import;
pub mod models;
mod registry;
mod tables;

pub use db::{Database, DatabaseError};
pub use import::ImportStats;
pub use tables::*;
