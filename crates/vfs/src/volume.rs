//! Uniform, capability-aware view over any backend.
//!
//! [`wrap()`] hands back backends that already satisfy the whole [`Volume`]
//! contract unchanged, and wraps everything else in a [`VolumeAdapter`] that
//! probes each optional contract once and fails with
//! [`Unsupported`](ErrorKind::Unsupported) for whatever is missing.

use crate::backend::{
    Backend, BoxSyncRead, BoxSyncWrite, MkdirFs, OpenDirFs, OpenWriterFs, RemoveFs, RenameFs, StatFs, TruncateFs,
    WriteFlags,
};
use crate::error::{ErrorKind, Result};
use crate::{Capability, FileInfo};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// The full operation contract: traversal plus every optional contract.
///
/// Operations a particular volume cannot perform fail with
/// [`ErrorKind::Unsupported`]; use [`Backend::capabilities`] to check first.
pub trait Volume: Backend + StatFs + OpenWriterFs + RemoveFs + RenameFs + MkdirFs + TruncateFs {}

pub type VolumeHandle = Arc<dyn Volume>;

/// Present `backend` as a [`Volume`].
///
/// # Examples
///
/// ```
/// use filer_vfs::backend::{Backend, LocalBackend};
/// use std::sync::Arc;
///
/// let local = Arc::new(LocalBackend::new("/srv/files").unwrap());
/// let volume = filer_vfs::wrap(local.clone());
/// // LocalBackend is already a Volume: no extra indirection.
/// assert!(std::ptr::addr_eq(Arc::as_ptr(&volume), Arc::as_ptr(&local)));
/// ```
pub fn wrap(backend: Arc<dyn Backend>) -> VolumeHandle {
    if let Some(volume) = Arc::clone(&backend).as_volume() {
        return volume;
    }
    Arc::new(VolumeAdapter::new(backend))
}

/// Adapter for backends that only satisfy part of the contract.
///
/// Every probe runs once, at construction; the discovered contract objects
/// are stored and called directly afterwards.
pub struct VolumeAdapter {
    backend: Arc<dyn Backend>,
    stat: Option<Arc<dyn StatFs>>,
    writer: Option<Arc<dyn OpenWriterFs>>,
    remove: Option<Arc<dyn RemoveFs>>,
    rename: Option<Arc<dyn RenameFs>>,
    mkdir: Option<Arc<dyn MkdirFs>>,
    dir: Option<Arc<dyn OpenDirFs>>,
    truncate: Option<Arc<dyn TruncateFs>>,
    caps: OnceLock<Capability>,
}

impl VolumeAdapter {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            stat: Arc::clone(&backend).stat_fs(),
            writer: Arc::clone(&backend).writer_fs(),
            remove: Arc::clone(&backend).remove_fs(),
            rename: Arc::clone(&backend).rename_fs(),
            mkdir: Arc::clone(&backend).mkdir_fs(),
            dir: Arc::clone(&backend).dir_fs(),
            truncate: Arc::clone(&backend).truncate_fs(),
            backend,
            caps: OnceLock::new(),
        }
    }

    /// A view over the same backend that can only stat, read and list,
    /// whatever the backend itself supports.
    pub fn readonly(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            stat: self.stat.clone(),
            writer: None,
            remove: None,
            rename: None,
            mkdir: None,
            dir: self.dir.clone(),
            truncate: None,
            caps: OnceLock::new(),
        }
    }

    fn compute_caps(&self) -> Capability {
        let discovered = [
            (Capability::STAT, self.stat.is_some()),
            (Capability::WRITE, self.writer.is_some()),
            (Capability::REMOVE, self.remove.is_some()),
            (Capability::RENAME, self.rename.is_some()),
            (Capability::MKDIR, self.mkdir.is_some()),
            (Capability::TRUNCATE, self.truncate.is_some()),
        ];
        discovered.into_iter().filter(|(_, found)| *found).fold(Capability::READ, |caps, (cap, _)| caps | cap)
    }
}

#[async_trait]
impl Backend for VolumeAdapter {
    async fn open(&self, path: &Path) -> Result<BoxSyncRead> {
        self.backend.open(path).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        match &self.dir {
            Some(dir) => dir.open_dir(path).try_collect().await,
            None => self.backend.read_dir(path).await,
        }
    }

    fn capabilities(&self) -> Option<Capability> {
        Some(*self.caps.get_or_init(|| self.compute_caps()))
    }

    fn host_path(&self, path: &Path) -> Option<PathBuf> {
        self.backend.host_path(path)
    }

    fn as_volume(self: Arc<Self>) -> Option<Arc<dyn Volume>> {
        Some(self)
    }
}

impl Volume for VolumeAdapter {}

#[async_trait]
impl StatFs for VolumeAdapter {
    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        match &self.stat {
            Some(fs) => fs.stat(path).await,
            None => exn::bail!(ErrorKind::Unsupported("stat")),
        }
    }
}

#[async_trait]
impl OpenWriterFs for VolumeAdapter {
    async fn open_writer(&self, path: &Path, flags: WriteFlags) -> Result<BoxSyncWrite> {
        match &self.writer {
            Some(fs) => fs.open_writer(path, flags).await,
            None => exn::bail!(ErrorKind::Unsupported("open_writer")),
        }
    }
}

#[async_trait]
impl RemoveFs for VolumeAdapter {
    async fn remove(&self, path: &Path) -> Result<()> {
        match &self.remove {
            Some(fs) => fs.remove(path).await,
            None => exn::bail!(ErrorKind::Unsupported("remove")),
        }
    }
}

#[async_trait]
impl RenameFs for VolumeAdapter {
    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        match &self.rename {
            Some(fs) => fs.rename(from, to).await,
            None => exn::bail!(ErrorKind::Unsupported("rename")),
        }
    }
}

#[async_trait]
impl MkdirFs for VolumeAdapter {
    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        match &self.mkdir {
            Some(fs) => fs.mkdir(path, mode).await,
            None => exn::bail!(ErrorKind::Unsupported("mkdir")),
        }
    }
}

#[async_trait]
impl TruncateFs for VolumeAdapter {
    async fn truncate(&self, path: &Path, size: u64) -> Result<()> {
        match &self.truncate {
            Some(fs) => fs.truncate(path, size).await,
            None => exn::bail!(ErrorKind::Unsupported("truncate")),
        }
    }
}
