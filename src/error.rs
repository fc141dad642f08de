use rocket::response::{Responder, Response};
use rocket::{Request, http::Status};
use std::io::Cursor;

/// Errors raised by the registry core.
///
/// Lookup misses are not errors: repositories return `Option` for them. `NotFound` is raised
/// when an operation has to act on a package or version that no longer exists.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Duplicate name, invalid role, unparseable version string and similar input problems.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The acting user is not allowed to modify the package.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A stored or submitted descriptor is not valid JSON of the expected shape.
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(#[from] serde_json::Error),

    /// The latest-version bookkeeping cannot be kept consistent.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("store error: {0}")]
    Store(#[from] diesel::result::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// HTTP-facing error returned by route handlers.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    DatabaseError(String),
    InternalServerError(String),
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (Status::BadRequest, msg),
            ApiError::Forbidden(msg) => (Status::Forbidden, msg),
            ApiError::NotFound(msg) => (Status::NotFound, msg),
            ApiError::DatabaseError(msg) => (Status::InternalServerError, msg),
            ApiError::InternalServerError(msg) => (Status::InternalServerError, msg),
        };

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::Plain)
            .sized_body(message.len(), Cursor::new(message))
            .ok()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(_) => ApiError::BadRequest(err.to_string()),
            RegistryError::Forbidden(_) => ApiError::Forbidden(err.to_string()),
            RegistryError::NotFound(_) => ApiError::NotFound(err.to_string()),
            RegistryError::Store(_) | RegistryError::Connection(_) => {
                ApiError::DatabaseError(err.to_string())
            }
            _ => ApiError::InternalServerError(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::InternalServerError(format!("Background task failed: {err}"))
    }
}
