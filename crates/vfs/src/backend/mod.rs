//! Backend trait, optional operation contracts and implementations.
//!
//! A [`Backend`] only has to support read-only traversal. Everything else is
//! an optional contract ([`StatFs`], [`OpenWriterFs`], [`RemoveFs`],
//! [`RenameFs`], [`MkdirFs`], [`OpenDirFs`], [`TruncateFs`]) that the backend
//! advertises through a probe method returning `Some(self)`. The
//! [`volume`](crate::volume) module turns any backend into a uniform
//! [`Volume`](crate::Volume) by running those probes once.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod root;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::root::{HostDrives, MountTable, MultiVolumeRoot, RootBackend, VolumeTable};
use crate::error::Result;
use crate::models::FileInfo;
use crate::{Capability, Volume};
use async_trait::async_trait;
use futures::Stream;
use std::io::{Read, Write};
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;
pub type BoxSyncRead = Box<dyn Read + Send + 'static>;
pub type BoxSyncWrite = Box<dyn Write + Send + 'static>;

/// Minimal storage provider: read-only traversal plus capability probes.
///
/// All paths are relative to the backend root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation. `.` names the root itself.
///
/// # Probing
/// Each `*_fs()` method answers "does this backend fulfil that contract?" by
/// returning the backend itself as the contract object, or `None`. Probes
/// take `self: Arc<Self>` so the answer can be stored and called later
/// without borrowing the backend.
///
/// ```
/// use filer_vfs::backend::{Backend, LocalBackend};
/// use std::sync::Arc;
///
/// let backend: Arc<dyn Backend> = Arc::new(LocalBackend::new("/srv/files").unwrap());
/// assert!(backend.clone().rename_fs().is_some());
/// ```
#[async_trait]
pub trait Backend: Send + Sync {
    /// Open a file for streaming reads.
    ///
    /// Returns a `'static` boxed [`Read`] suitable for use inside
    /// [`spawn_blocking`](tokio::task::spawn_blocking). The async setup
    /// (opening the file) happens before returning.
    async fn open(&self, path: &Path) -> Result<BoxSyncRead>;

    /// List the entries of a directory.
    async fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>>;

    /// Self-reported capabilities. `None` (the default) means "probe me".
    fn capabilities(&self) -> Option<Capability> {
        None
    }

    /// The real host path behind `path`, for handing to external tools.
    /// `None` when the backend isn't host-backed or the path is invalid.
    fn host_path(&self, _path: &Path) -> Option<PathBuf> {
        None
    }

    /// The backend already satisfies the whole uniform contract.
    fn as_volume(self: Arc<Self>) -> Option<Arc<dyn Volume>> {
        None
    }

    fn stat_fs(self: Arc<Self>) -> Option<Arc<dyn StatFs>> {
        None
    }

    fn writer_fs(self: Arc<Self>) -> Option<Arc<dyn OpenWriterFs>> {
        None
    }

    fn remove_fs(self: Arc<Self>) -> Option<Arc<dyn RemoveFs>> {
        None
    }

    fn rename_fs(self: Arc<Self>) -> Option<Arc<dyn RenameFs>> {
        None
    }

    fn mkdir_fs(self: Arc<Self>) -> Option<Arc<dyn MkdirFs>> {
        None
    }

    fn dir_fs(self: Arc<Self>) -> Option<Arc<dyn OpenDirFs>> {
        None
    }

    fn truncate_fs(self: Arc<Self>) -> Option<Arc<dyn TruncateFs>> {
        None
    }
}

/// Get file metadata without reading contents.
#[async_trait]
pub trait StatFs: Send + Sync {
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}

/// Open a file for streaming writes.
///
/// Callers should call `flush()` before dropping the writer to ensure errors
/// are propagated.
#[async_trait]
pub trait OpenWriterFs: Send + Sync {
    async fn open_writer(&self, path: &Path, flags: WriteFlags) -> Result<BoxSyncWrite>;
}

/// Remove a file or an empty directory.
#[async_trait]
pub trait RemoveFs: Send + Sync {
    async fn remove(&self, path: &Path) -> Result<()>;
}

/// Rename/move a file or directory within the same backend.
#[async_trait]
pub trait RenameFs: Send + Sync {
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// Create a single directory with the given permission bits.
#[async_trait]
pub trait MkdirFs: Send + Sync {
    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()>;
}

/// Preferred, streaming way of listing a directory.
///
/// If a backend doesn't implement this, [`Backend::read_dir`] is used.
pub trait OpenDirFs: Send + Sync {
    fn open_dir<'a>(&'a self, path: &'a Path) -> FileInfoStream<'a>;
}

/// Truncate (or extend) a file to the given size.
#[async_trait]
pub trait TruncateFs: Send + Sync {
    async fn truncate(&self, path: &Path, size: u64) -> Result<()>;
}

/// How [`OpenWriterFs::open_writer`] should open a file. The file is always
/// opened for writing; these flags add to that.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteFlags(u8);

impl WriteFlags {
    /// Open an existing file, positioned at the start, without truncating.
    pub const NONE: Self = Self(0);
    /// Writes go to the end of the file.
    pub const APPEND: Self = Self(1);
    /// Create the file if it does not exist.
    pub const CREATE: Self = Self(1 << 1);
    /// Truncate the file to zero length on open.
    pub const TRUNCATE: Self = Self(1 << 2);
    /// Fail if the file already exists (implies create).
    pub const EXCLUSIVE: Self = Self(1 << 3);

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Host open options equivalent to these flags.
    pub(crate) fn to_open_options(self) -> tokio::fs::OpenOptions {
        let mut options = tokio::fs::OpenOptions::new();
        options
            .write(true)
            .append(self.contains(Self::APPEND))
            .truncate(self.contains(Self::TRUNCATE))
            .create(self.contains(Self::CREATE))
            .create_new(self.contains(Self::EXCLUSIVE));
        options
    }
}

impl BitOr for WriteFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
