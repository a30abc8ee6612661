//! Error types for pressfeat.
//!
//! Library crates use [`PressfeatError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pressfeat operations.
#[derive(Debug, thiserror::Error)]
pub enum PressfeatError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Article HTML could not be turned into an article record.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Tagger subprocess failure: spawn, pipe I/O, closed stdout, or a
    /// protocol violation. The shared process is unusable afterwards.
    #[error("tagger error: {0}")]
    Tagger(String),

    /// A tagger answered a request with an error reply for that input.
    #[error("{tagger} tagger rejected input: {message}")]
    TaggerRejected {
        tagger: &'static str,
        message: String,
    },

    /// A tagger returned a different number of tags than tokens it was given.
    #[error("{tagger} tagger returned {actual} tags for {expected} tokens")]
    TagCountMismatch {
        tagger: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PressfeatError>;

impl PressfeatError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error only concerns the document being processed.
    ///
    /// Document-level errors mark the document as failed and the pass goes
    /// on; everything else aborts the pass.
    pub fn is_document_level(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::TaggerRejected { .. } | Self::TagCountMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PressfeatError::config("missing tagger command");
        assert_eq!(err.to_string(), "config error: missing tagger command");

        let err = PressfeatError::TagCountMismatch {
            tagger: "pos",
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.to_string(), "pos tagger returned 3 tags for 4 tokens");
    }

    #[test]
    fn document_level_classification() {
        assert!(PressfeatError::parse("empty html").is_document_level());
        assert!(
            PressfeatError::TaggerRejected {
                tagger: "ner",
                message: "sentence too long".into(),
            }
            .is_document_level()
        );
        assert!(!PressfeatError::Tagger("closed stdout".into()).is_document_level());
        assert!(!PressfeatError::Storage("locked".into()).is_document_level());
        assert!(!PressfeatError::config("bad").is_document_level());
    }
}
