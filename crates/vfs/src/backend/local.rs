//! Local filesystem backend.
//!
//! This module provides a backend rooted at a host directory. Every optional
//! operation contract is implemented, mapped onto `tokio::fs` calls joined
//! under the root.

use crate::backend::{
    Backend, BoxSyncRead, BoxSyncWrite, FileInfoStream, MkdirFs, OpenDirFs, OpenWriterFs, RemoveFs, RenameFs,
    StatFs, TruncateFs, WriteFlags,
};
use crate::error::{ErrorKind, Result};
use crate::{Capability, FileInfo, Volume, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, DirEntry};

/// Local filesystem backend.
///
/// All paths are relative to the configured root directory; a path that would
/// leave the root fails with [`InvalidPath`](ErrorKind::InvalidPath) before
/// the host filesystem is touched. Host errors are passed through unchanged
/// as [`ErrorKind::Io`].
///
/// # Examples
///
/// ```no_run
/// use filer_vfs::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("/path/to/files")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    /// Root directory all relative paths are joined onto.
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend. No I/O is performed.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is not
    /// absolute.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::invalid_path("new", root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the absolute path for a relative backend path.
    ///
    /// Validates the path and joins it with the root directory.
    fn absolute_path(&self, op: &'static str, path: &Path) -> Result<PathBuf> {
        let validated = validate_path(op, path)?;
        match validated.as_os_str().is_empty() {
            true => Ok(self.root.clone()),
            false => Ok(self.root.join(validated)),
        }
    }

    fn entry_name(path: &Path) -> String {
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| ".".to_string())
    }

    async fn process_entry(entry: DirEntry) -> Result<FileInfo> {
        let metadata = entry.metadata().await.map_err(ErrorKind::Io)?;
        Ok(FileInfo::from_metadata(entry.file_name().to_string_lossy(), &metadata))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn open(&self, path: &Path) -> Result<BoxSyncRead> {
        let abs_path = self.absolute_path("open", path)?;
        let file = fs::File::open(&abs_path).await.map_err(ErrorKind::Io)?;
        Ok(Box::new(file.into_std().await))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        self.open_dir(path).try_collect().await
    }

    fn capabilities(&self) -> Option<Capability> {
        Some(Capability::ALL)
    }

    fn host_path(&self, path: &Path) -> Option<PathBuf> {
        self.absolute_path("resolve", path).ok()
    }

    fn as_volume(self: Arc<Self>) -> Option<Arc<dyn Volume>> {
        Some(self)
    }

    fn stat_fs(self: Arc<Self>) -> Option<Arc<dyn StatFs>> {
        Some(self)
    }

    fn writer_fs(self: Arc<Self>) -> Option<Arc<dyn OpenWriterFs>> {
        Some(self)
    }

    fn remove_fs(self: Arc<Self>) -> Option<Arc<dyn RemoveFs>> {
        Some(self)
    }

    fn rename_fs(self: Arc<Self>) -> Option<Arc<dyn RenameFs>> {
        Some(self)
    }

    fn mkdir_fs(self: Arc<Self>) -> Option<Arc<dyn MkdirFs>> {
        Some(self)
    }

    fn dir_fs(self: Arc<Self>) -> Option<Arc<dyn OpenDirFs>> {
        Some(self)
    }

    fn truncate_fs(self: Arc<Self>) -> Option<Arc<dyn TruncateFs>> {
        Some(self)
    }
}

impl Volume for LocalBackend {}

#[async_trait]
impl StatFs for LocalBackend {
    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let abs_path = self.absolute_path("stat", path)?;
        let metadata = fs::metadata(&abs_path).await.map_err(ErrorKind::Io)?;
        Ok(FileInfo::from_metadata(Self::entry_name(path), &metadata))
    }
}

impl OpenDirFs for LocalBackend {
    fn open_dir<'a>(&'a self, path: &'a Path) -> FileInfoStream<'a> {
        let abs_path = match self.absolute_path("readdir", path) {
            Ok(abs) => abs,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        Box::pin(stream! {
            let mut entries = match fs::read_dir(&abs_path).await {
                Ok(entries) => entries,
                Err(err) => {
                    yield Err(exn::Exn::from(ErrorKind::Io(err)));
                    return;
                },
            };
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => yield Self::process_entry(entry).await,
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(exn::Exn::from(ErrorKind::Io(err)));
                        break;
                    },
                }
            }
        })
    }
}

#[async_trait]
impl OpenWriterFs for LocalBackend {
    async fn open_writer(&self, path: &Path, flags: WriteFlags) -> Result<BoxSyncWrite> {
        let abs_path = self.absolute_path("open", path)?;
        let mut options = flags.to_open_options();
        #[cfg(unix)]
        options.mode(0o777);
        let file = options.open(&abs_path).await.map_err(ErrorKind::Io)?;
        Ok(Box::new(file.into_std().await))
    }
}

#[async_trait]
impl TruncateFs for LocalBackend {
    async fn truncate(&self, path: &Path, size: u64) -> Result<()> {
        let abs_path = self.absolute_path("truncate", path)?;
        let file = fs::OpenOptions::new().write(true).open(&abs_path).await.map_err(ErrorKind::Io)?;
        Ok(file.set_len(size).await.map_err(ErrorKind::Io)?)
    }
}

#[async_trait]
impl RemoveFs for LocalBackend {
    async fn remove(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path("remove", path)?;
        let metadata = fs::symlink_metadata(&abs_path).await.map_err(ErrorKind::Io)?;
        match metadata.is_dir() {
            true => Ok(fs::remove_dir(&abs_path).await.map_err(ErrorKind::Io)?),
            false => Ok(fs::remove_file(&abs_path).await.map_err(ErrorKind::Io)?),
        }
    }
}

#[async_trait]
impl MkdirFs for LocalBackend {
    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        let abs_path = self.absolute_path("mkdir", path)?;
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        Ok(builder.create(&abs_path).await.map_err(ErrorKind::Io)?)
    }
}

#[async_trait]
impl RenameFs for LocalBackend {
    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.absolute_path("rename", from)?;
        let to_path = self.absolute_path("rename", to)?;
        Ok(fs::rename(&from_path, &to_path).await.map_err(ErrorKind::Io)?)
    }
}
