//! Read-only view over any volume.
//!
//! Wraps a [`VolumeHandle`] and refuses every mutating operation with
//! [`Unsupported`](ErrorKind::Unsupported), whatever the wrapped volume
//! could do.

use crate::backend::{
    Backend, BoxSyncRead, BoxSyncWrite, MkdirFs, OpenWriterFs, RemoveFs, RenameFs, StatFs, TruncateFs, WriteFlags,
};
use crate::error::{Error, ErrorKind, Result};
use crate::{Capability, FileInfo, Volume, VolumeHandle};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Restrict `volume` to stat, read and directory listing.
pub fn readonly(volume: VolumeHandle) -> VolumeHandle {
    Arc::new(ReadOnlyVolume::new(volume))
}

/// Read-only volume.
///
/// Delegates stat, open and directory listing; everything else fails with
/// [`ErrorKind::Unsupported`] and logs a [`debug event`](tracing::Event).
#[derive(Clone)]
pub struct ReadOnlyVolume {
    inner: VolumeHandle,
}

impl ReadOnlyVolume {
    pub fn new(inner: VolumeHandle) -> Self {
        Self { inner }
    }

    fn refuse(op: &'static str, path: &Path) -> Error {
        tracing::debug!(op, path = %path.display(), "Refusing mutation on read-only volume");
        exn::Exn::from(ErrorKind::Unsupported(op))
    }
}

#[async_trait]
impl Backend for ReadOnlyVolume {
    async fn open(&self, path: &Path) -> Result<BoxSyncRead> {
        self.inner.open(path).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        self.inner.read_dir(path).await
    }

    fn capabilities(&self) -> Option<Capability> {
        self.inner.capabilities().map(|caps| caps & Capability::READ_ONLY)
    }

    fn host_path(&self, path: &Path) -> Option<PathBuf> {
        self.inner.host_path(path)
    }

    fn as_volume(self: Arc<Self>) -> Option<Arc<dyn Volume>> {
        Some(self)
    }

    fn stat_fs(self: Arc<Self>) -> Option<Arc<dyn StatFs>> {
        Some(self)
    }
}

impl Volume for ReadOnlyVolume {}

#[async_trait]
impl StatFs for ReadOnlyVolume {
    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }
}

#[async_trait]
impl OpenWriterFs for ReadOnlyVolume {
    async fn open_writer(&self, path: &Path, _flags: WriteFlags) -> Result<BoxSyncWrite> {
        Err(Self::refuse("open_writer", path))
    }
}

#[async_trait]
impl RemoveFs for ReadOnlyVolume {
    async fn remove(&self, path: &Path) -> Result<()> {
        Err(Self::refuse("remove", path))
    }
}

#[async_trait]
impl RenameFs for ReadOnlyVolume {
    async fn rename(&self, from: &Path, _to: &Path) -> Result<()> {
        Err(Self::refuse("rename", from))
    }
}

#[async_trait]
impl MkdirFs for ReadOnlyVolume {
    async fn mkdir(&self, path: &Path, _mode: u32) -> Result<()> {
        Err(Self::refuse("mkdir", path))
    }
}

#[async_trait]
impl TruncateFs for ReadOnlyVolume {
    async fn truncate(&self, path: &Path, _size: u64) -> Result<()> {
        Err(Self::refuse("truncate", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;

    #[tokio::test]
    async fn test_readonly_refuses_mutations() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("keep.txt"), b"data").unwrap();
        let volume = readonly(Arc::new(LocalBackend::new(temp_dir.path()).unwrap()));

        assert_eq!(volume.capabilities(), Some(Capability::READ_ONLY));
        assert_eq!(volume.stat(Path::new("keep.txt")).await.unwrap().size, 4);
        assert_eq!(volume.read_dir(Path::new(".")).await.unwrap().len(), 1);

        let err = volume.remove(Path::new("keep.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unsupported("remove")));
        let err = volume.rename(Path::new("keep.txt"), Path::new("moved.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unsupported("rename")));
        let err = volume.open_writer(Path::new("keep.txt"), WriteFlags::TRUNCATE).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Unsupported("open_writer")));
        assert!(temp_dir.path().join("keep.txt").exists());
        assert_eq!(std::fs::read(temp_dir.path().join("keep.txt")).unwrap(), b"data");
    }
}
