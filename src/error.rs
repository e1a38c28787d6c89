use std::path::PathBuf;

/// Per-attempt upload failures. Every variant is retryable from the
/// watcher's point of view; the retry budget decides what becomes terminal.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("object store returned http {0}")]
    StoreStatus(u16),
    #[error("s3 error: {0}")]
    Store(#[from] s3::error::S3Error),
    #[error("file name '{0}' has no series key")]
    InvalidSeriesName(String),
    #[error("series companions missing for {0}")]
    MissingCompanions(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
