//! Error type shared by sources, the pipeline, and the writers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::SourceId;

/// Error type for annotation loading, corpus streaming, and output failures.
#[derive(Debug, Error)]
pub enum RebuildError {
    /// A source could not be opened or its stream failed; the rest of it is unreadable.
    #[error("row source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable {
        /// Source that failed.
        source_id: SourceId,
        /// Underlying failure.
        reason: String,
    },
    /// One row could not be decoded; the stream can continue.
    #[error("row source '{source_id}' returned an unreadable row: {details}")]
    SourceInconsistent {
        /// Source the row came from.
        source_id: SourceId,
        /// Where and why decoding failed.
        details: String,
    },
    /// The master annotation file could not be retrieved or parsed.
    #[error("annotation source failed: {0}")]
    Annotations(String),
    /// An output file could not be written.
    #[error("could not write {}: {reason}", path.display())]
    Output {
        /// File being written.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },
    /// Filesystem failure outside a specific output file.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RebuildError {
    /// True when the failure only affects a single row and the stream can continue.
    pub fn is_row_level(&self) -> bool {
        matches!(self, Self::SourceInconsistent { .. })
    }
}
