//! File metadata returned by [`stat`](crate::backend::StatFs::stat) and
//! directory listings.

use std::fs::Metadata;
use time::OffsetDateTime;

/// Owner-write permission bit.
const OWNER_WRITE: u32 = 0o200;

/// Metadata for a single file, directory or synthetic volume entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Final path component (or volume name for synthetic root entries).
    pub name: String,
    /// File size in bytes; zero for directories.
    pub size: u64,
    /// Last modified timestamp, when the host reports one.
    pub modified: Option<OffsetDateTime>,
    pub is_dir: bool,
    /// Unix-style permission bits. Synthesised from the read-only flag on
    /// hosts without them.
    pub mode: u32,
}

impl FileInfo {
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> Self {
        let is_dir = metadata.is_dir();
        Self {
            name: name.into(),
            size: if is_dir { 0 } else { metadata.len() },
            modified: metadata.modified().ok().map(OffsetDateTime::from),
            is_dir,
            mode: Self::mode_of(metadata),
        }
    }

    /// A directory entry with no size and no modification time, used for
    /// volumes listed under a multi-volume root.
    pub fn synthetic_dir(name: impl Into<String>) -> Self {
        Self { name: name.into(), size: 0, modified: None, is_dir: true, mode: 0o555 }
    }

    /// Whether the owner-write permission bit is set.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.mode & OWNER_WRITE != 0
    }

    #[cfg(unix)]
    fn mode_of(metadata: &Metadata) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o7777
    }

    #[cfg(not(unix))]
    fn mode_of(metadata: &Metadata) -> u32 {
        match metadata.permissions().readonly() {
            true => 0o555,
            false => 0o777,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_dir() {
        let info = FileInfo::synthetic_dir("C:");
        assert!(info.is_dir);
        assert_eq!(info.size, 0);
        assert!(info.modified.is_none());
        assert!(!info.is_writable());
    }

    #[test]
    fn test_from_metadata() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("file.txt");
        std::fs::write(&path, b"12345").unwrap();
        let info = FileInfo::from_metadata("file.txt", &std::fs::metadata(&path).unwrap());
        assert_eq!(info.name, "file.txt");
        assert_eq!(info.size, 5);
        assert!(!info.is_dir);
        assert!(info.modified.is_some());
        assert!(info.is_writable());
    }
}
