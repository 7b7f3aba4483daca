use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by scanning and recovery
///
/// A short final read and a header with no remaining payload are normal
/// outcomes, not errors.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The image cannot be opened or read; terminal for the whole pass
    #[error("image source unavailable: {0}")]
    SourceUnavailable(#[source] io::Error),

    /// A recovered file cannot be written; affects that file only
    #[error("cannot write recovered file {}: {source}", path.display())]
    OutputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid unit layout: {0}")]
    InvalidLayout(String),

    #[error("cannot load layout from {}: {message}", path.display())]
    LayoutFile { path: PathBuf, message: String },

    /// `recover()` was called before an image was indexed
    #[error("no image has been indexed")]
    NotBuilt,
}

impl RecoveryError {
    /// Whether the pass may continue after this error
    pub fn is_local(&self) -> bool {
        matches!(self, RecoveryError::OutputUnavailable { .. })
    }
}
