//! In-memory backend for testing.

use super::{Backend, BoxSyncRead, RemoveFs, StatFs};
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Error as IoError, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// In-memory backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`]; directories exist
/// implicitly as the parents of stored files. Only [`StatFs`] and
/// [`RemoveFs`] are offered on top of [`Backend`], which makes it a handy
/// partial backend for exercising [`wrap()`](crate::wrap).
///
/// # Examples
///
/// ```
/// use filer_vfs::backend::{Backend, MockBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("photos/cat.png", b"not really a png"),
/// ]);
/// assert_eq!(backend.read_dir(Path::new("photos")).await?.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    storage: RwLock<HashMap<PathBuf, (OffsetDateTime, Vec<u8>)>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path("with_files", &path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self { storage: RwLock::new(map) }
    }

    fn not_found() -> ErrorKind {
        ErrorKind::Io(IoError::from(IoErrorKind::NotFound))
    }

    fn file_info(path: &Path, size: u64, modified: OffsetDateTime) -> FileInfo {
        let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        FileInfo { name, size, modified: Some(modified), is_dir: false, mode: 0o644 }
    }

    fn dir_info(name: impl Into<String>) -> FileInfo {
        FileInfo { name: name.into(), size: 0, modified: None, is_dir: true, mode: 0o755 }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn open(&self, path: &Path) -> Result<BoxSyncRead> {
        let path = validate_path("open", path)?;
        let (_modified, data) = self.storage.read().await.get(&path).cloned().ok_or_else(Self::not_found)?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        let dir = validate_path("read_dir", path)?;
        let guard = self.storage.read().await;
        let mut entries: BTreeMap<String, FileInfo> = BTreeMap::new();
        for (path, (modified, data)) in guard.iter() {
            let Ok(rest) = path.strip_prefix(&dir) else { continue };
            let mut components = rest.components();
            let Some(first) = components.next() else { continue };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let info = match components.next() {
                Some(_) => Self::dir_info(name.clone()),
                None => Self::file_info(path, data.len() as u64, *modified),
            };
            entries.insert(name, info);
        }
        match entries.is_empty() && !dir.as_os_str().is_empty() {
            true => Err(Self::not_found().into()),
            false => Ok(entries.into_values().collect()),
        }
    }

    fn stat_fs(self: Arc<Self>) -> Option<Arc<dyn StatFs>> {
        Some(self)
    }

    fn remove_fs(self: Arc<Self>) -> Option<Arc<dyn RemoveFs>> {
        Some(self)
    }
}

#[async_trait]
impl StatFs for MockBackend {
    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path("stat", path)?;
        let guard = self.storage.read().await;
        if let Some((modified, data)) = guard.get(&path) {
            return Ok(Self::file_info(&path, data.len() as u64, *modified));
        }
        let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        match guard.keys().any(|file| file.starts_with(&path)) {
            true => Ok(Self::dir_info(name)),
            false => Err(Self::not_found().into()),
        }
    }
}

#[async_trait]
impl RemoveFs for MockBackend {
    async fn remove(&self, path: &Path) -> Result<()> {
        let path = validate_path("remove", path)?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(Self::not_found()))
    }
}
