use thiserror::Error;

use coderecap_agent::SourceError;

/// Errors that abort a run. Everything unit-scoped is surfaced as data
/// (skips, diagnostics) instead.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),
}
