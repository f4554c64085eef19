use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("unsupported file format: '{0}' (supported: csv, xlsx, xls)")]
    UnsupportedFormat(String),
    #[error("file contains no data rows: {0}")]
    EmptyFile(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("excel error: {0}")]
    Excel(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
