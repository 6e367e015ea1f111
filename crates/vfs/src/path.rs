//! Path validation and security utilities.
//!
//! This module provides functions to validate backend-relative paths and
//! prevent path traversal out of a backend root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a backend-relative path for security and correctness.
/// Ensures that paths don't escape the backend root (no `..` traversal).
///
/// `op` names the operation for the error message.
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid (an empty path means the root
/// itself), or [`InvalidPath`](crate::error::ErrorKind::InvalidPath) if
/// invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use filer_vfs::validate_path;
/// // Valid paths
/// assert!(validate_path("open", "photos/cat.png").is_ok());
/// assert!(validate_path("open", "a/../file.png").is_ok()); // (never leaves root)
/// assert_eq!(validate_path("readdir", ".").unwrap(), Path::new(""));
/// // Invalid paths
/// assert!(validate_path("open", "../etc/passwd").is_err());
/// assert!(validate_path("open", "/etc/passwd").is_err());
/// assert!(validate_path("open", "a\0b").is_err());
/// ```
pub fn validate(op: &'static str, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        exn::bail!(ErrorKind::invalid_path(op, path));
    }
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls, reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::invalid_path(op, path));
                }
                components.push(s)
            },
            Component::CurDir => {},
            // Relative paths only: the composite root strips volume prefixes
            // and leading separators before routing here.
            Component::RootDir | Component::Prefix(_) => exn::bail!(ErrorKind::invalid_path(op, path)),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::invalid_path(op, path));
                }
            },
        }
    }
    Ok(components.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("photos/cat.png", "photos/cat.png")]
    #[case("a/b/c/file.jpeg", "a/b/c/file.jpeg")]
    #[case("simple.gif", "simple.gif")]
    #[case("a//b//c", "a/b/c")]
    #[case("a/./b/./c", "a/b/c")]
    #[case("a/b/..", "a")]
    #[case("Photos1///", "Photos1")]
    #[case(".", "")]
    #[case("./.", "")]
    #[case("a/..", "")]
    fn test_valid_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate("test", input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("")]
    #[case("..")]
    #[case("../..")]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("/etc/passwd")]
    #[case("//")]
    #[case("a\0b")]
    #[case("\0")]
    fn test_invalid_paths(#[case] input: &str) {
        let err = validate("mkdir", input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath { op: "mkdir", .. }));
    }
}
