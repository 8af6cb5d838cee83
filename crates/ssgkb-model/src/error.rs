//! Error kinds shared by parsers, handlers and the importer.

use thiserror::Error;

/// Failure kinds surfaced at component boundaries.
///
/// Parsers and handler shims turn local failures into one of these; the
/// importer counts them per category and only the run-level kinds
/// (`ListFailed`, `FetchFailed`, `Panic`) terminate a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SsgError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("read failed for {path}: {message}")]
    IoRead { path: String, message: String },

    #[error("write failed: {0}")]
    IoWrite(String),

    #[error("listing {category} failed: {message}")]
    ListFailed { category: String, message: String },

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("timed out after {seconds}s: {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("panic: {0}")]
    Panic(String),

    #[error("state conflict: {0}")]
    StateConflict(String),
}

pub type SsgResult<T> = std::result::Result<T, SsgError>;

impl SsgError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        SsgError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        SsgError::InvalidFormat(message.into())
    }

    pub fn io_read(path: impl AsRef<std::path::Path>, err: &std::io::Error) -> Self {
        SsgError::IoRead {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    /// Whether the error ends an import run instead of a single file.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            SsgError::ListFailed { .. } | SsgError::FetchFailed(_) | SsgError::Panic(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_fatal_kinds() {
        assert!(SsgError::FetchFailed("x".into()).is_run_fatal());
        assert!(SsgError::Panic("boom".into()).is_run_fatal());
        assert!(!SsgError::invalid("bad name").is_run_fatal());
        assert!(!SsgError::Timeout {
            what: "a.html".into(),
            seconds: 300
        }
        .is_run_fatal());
    }

    #[test]
    fn not_found_message_names_kind_and_id() {
        let err = SsgError::not_found("guide", "ssg-rhel9-guide-cis");
        assert_eq!(err.to_string(), "guide not found: ssg-rhel9-guide-cis");
    }
}
