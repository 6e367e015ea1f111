//! Filesystem Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A filesystem error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for filesystem operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The backend does not provide this operation. A normal outcome for
    /// partial backends; check [`Capability`](crate::Capability) first.
    #[display("unsupported operation: {_0}")]
    Unsupported(#[error(not(source))] &'static str),
    /// Path is malformed or escapes the backend root.
    #[display("{op} {}: invalid path", path.display())]
    InvalidPath {
        #[error(not(source))]
        op: &'static str,
        #[error(not(source))]
        path: PathBuf,
    },
    /// Arguments are individually valid but cannot be combined, such as a
    /// rename between two different volumes.
    #[display("{op} {}: invalid argument", path.display())]
    InvalidArgument {
        #[error(not(source))]
        op: &'static str,
        #[error(not(source))]
        path: PathBuf,
    },
    /// Path names a volume the host does not have.
    #[display("unknown volume: {_0}")]
    UnknownVolume(#[error(not(source))] String),
    /// Underlying host I/O error, unchanged.
    #[display("I/O error: {_0}")]
    Io(IoError),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// The host error kind, if this wraps one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io(err) => Some(err.kind()),
            _ => None,
        }
    }

    pub(crate) fn invalid_path(op: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::InvalidPath { op, path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Unsupported("rename").to_string(), "unsupported operation: rename");
        assert_eq!(ErrorKind::invalid_path("remove", "../x").to_string(), "remove ../x: invalid path");
        assert_eq!(ErrorKind::UnknownVolume("Q:".to_string()).to_string(), "unknown volume: Q:");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::Unsupported("mkdir").is_retryable());
        assert!(!ErrorKind::invalid_path("open", "../x").is_retryable());
        assert!(ErrorKind::Io(IoError::other("disk on fire")).is_retryable());
    }

    #[test]
    fn io_kind_preserved() {
        let kind = ErrorKind::from(IoError::from(std::io::ErrorKind::NotFound));
        assert_eq!(kind.io_kind(), Some(std::io::ErrorKind::NotFound));
        assert_eq!(ErrorKind::Unsupported("stat").io_kind(), None);
    }
}
