mod database;
mod repository;
mod rows;
mod session;
mod sqlite;

pub use database::*;
pub use repository::*;
pub use session::*;
pub use sqlite::*;

/// SQL migration for the accounts and transactions tables
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
