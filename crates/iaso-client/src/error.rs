use thiserror::Error;

use iaso_model::RowFailure;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{context}: status {status}: {body}")]
    Status {
        context: &'static str,
        status: u16,
        body: String,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected payload: {0}")]
    Payload(String),
    #[error("form definition workbook: {0}")]
    Workbook(String),
}

impl ClientError {
    /// Fold into a per-row failure; used once row processing has begun,
    /// where client errors must not escape the row boundary.
    pub fn into_row_failure(self) -> RowFailure {
        match self {
            ClientError::Status {
                context,
                status,
                body,
            } => RowFailure::UploadFailure {
                context,
                status,
                body,
            },
            other => RowFailure::Transport(other.to_string()),
        }
    }
}
