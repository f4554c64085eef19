use thiserror::Error;

/// Fatal, run-level errors. Raised before any row is processed; once row
/// processing begins, failures stay inside row boundaries as [`RowFailure`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("form {0} not found")]
    FormNotFound(i64),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("user lacks required permissions: {0}")]
    PermissionDenied(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;

/// Why one row did not result in a platform write.
///
/// Every variant folds into the run summary's `ignored` counter plus a log
/// line; none of them aborts the batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowFailure {
    #[error("required column missing or empty: {0}")]
    SchemaError(String),
    #[error("constraint violations: {}", .0.join(", "))]
    ConstraintViolation(Vec<String>),
    #[error("unknown form version: {0}")]
    VersionNotFound(String),
    #[error("instance is locked")]
    LockedInstance,
    #[error("upload failed ({context}): status {status}, {body}")]
    UploadFailure {
        context: &'static str,
        status: u16,
        body: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
}

impl RowFailure {
    pub fn missing_column(column: &str) -> Self {
        RowFailure::SchemaError(column.to_string())
    }
}
