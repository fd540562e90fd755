//! Error types for the editing core.

use std::fmt;

/// Every error the editing core can produce.
#[derive(Debug)]
pub enum EditorError {
    /// A standard I/O error (reading a config or state file).
    Io(std::io::Error),

    /// JSON was syntactically or structurally invalid.
    Json(serde_json::Error),

    /// Persisted state was written by an incompatible format version.
    UnsupportedVersion {
        /// The version found in the data.
        found: u32,
        /// The version this build understands.
        expected: u32,
    },

    /// Persisted state decoded but violates an invariant (e.g. empty undo stack).
    InvalidState(String),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::UnsupportedVersion { found, expected } => {
                write!(f, "unsupported state version {found} (expected {expected})")
            }
            Self::InvalidState(msg) => write!(f, "invalid editor state: {msg}"),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::UnsupportedVersion { .. } | Self::InvalidState(_) => None,
        }
    }
}

impl From<std::io::Error> for EditorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EditorError>;

/// Error reported by a [`crate::highlight::Highlighter`] for a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightError {
    message: String,
}

impl HighlightError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HighlightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "highlight pass failed: {}", self.message)
    }
}

impl std::error::Error for HighlightError {}
