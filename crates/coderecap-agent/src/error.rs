use thiserror::Error;

/// Errors that can occur while scanning a log source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read source file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse source JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to query cursor database: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Source root is not usable: {0}")]
    BadRoot(String),
}
