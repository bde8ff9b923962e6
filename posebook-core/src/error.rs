//! Error type shared by the model and the codecs

use std::path::PathBuf;

/// Errors surfaced by library operations and codecs.
///
/// Tolerant codecs (CSV, bone morphs, pose clips) never return these for a
/// single bad record; they collect warnings in an
/// [`ImportReport`](crate::formats::ImportReport) instead.
#[derive(Debug, thiserror::Error)]
pub enum PoseLibError {
    /// Structural parse failure in a strict format (VPD)
    #[error("Invalid file at line {line}: {reason}")]
    InvalidFile { line: usize, reason: String },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Text not representable in, or not decodable from, Shift_JIS
    #[error("Shift_JIS error: {0}")]
    Encoding(String),

    #[error("Invalid {kind} index {index} (len {len})")]
    InvalidIndex {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("PoseBook '{0}' not found")]
    BookNotFound(String),

    #[error("Source and target PoseBook are the same")]
    SameBook,

    #[error("No active PoseBook")]
    NoActiveBook,

    #[error("No active pose")]
    NoActivePose,

    #[error("Invalid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),
}

impl PoseLibError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_file(line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            line,
            reason: reason.into(),
        }
    }

    /// True for the structural "invalid file" condition of strict formats
    pub fn is_invalid_file(&self) -> bool {
        matches!(self, Self::InvalidFile { .. })
    }
}

pub type Result<T> = std::result::Result<T, PoseLibError>;
