//! Database module providing organized access to all registry tables
//!
//! Each sub-module owns one table and offers two layers:
//! - an `*Operations` struct that borrows the pool and runs one operation per call
//! - free functions over `&mut SqliteConnection` so that workflows can compose
//!   several steps inside a single transaction
//!
//! `service::DatabaseService` owns the pool and exposes the operations.

pub mod authors;
pub mod connection;
pub mod log_entries;
pub mod package_authors;
pub mod packages;
pub mod projection;
pub mod service;
pub mod users;
pub mod versions;

use crate::error::RegistryError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

// Re-export the main types and service for easy access
pub use connection::{DbConnection, DbPool, MIGRATIONS};
pub use service::DatabaseService;

// Re-export operation structs for advanced usage
pub use authors::AuthorOperations;
pub use log_entries::LogOperations;
pub use package_authors::PackageAuthorOperations;
pub use packages::PackageOperations;
pub use projection::ProjectionOperations;
pub use users::UserOperations;
pub use versions::VersionOperations;

/// Turns a unique-constraint failure into a validation error; other errors pass through.
pub(crate) fn map_unique_violation(
    err: DieselError,
    message: impl FnOnce() -> String,
) -> RegistryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            RegistryError::Validation(message())
        }
        other => RegistryError::Store(other),
    }
}
