use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Validation(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Error getting file duration: {0}")]
    DurationProbe(String),

    #[error("Audio extraction error: {0}")]
    Extraction(String),

    #[error("Error generating silent audio: {0}")]
    Synthesis(String),

    #[error("Audio decoding error: {0}")]
    Decode(String),

    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("Error syncing audio: {0}")]
    Transcode(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Missing inputs or a duration mismatch
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_) | SyncError::FileNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
