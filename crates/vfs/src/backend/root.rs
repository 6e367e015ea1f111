//! Composite root backend.
//!
//! Presents the whole host as one backend. Single-root hosts get one
//! [`LocalBackend`] at `/`; multi-volume hosts (drive letters) get one
//! [`LocalBackend`] per volume, selected by the first path component.

use crate::backend::{
    Backend, BoxSyncRead, BoxSyncWrite, LocalBackend, MkdirFs, OpenWriterFs, RemoveFs, RenameFs, StatFs, TruncateFs,
    WriteFlags,
};
use crate::error::{ErrorKind, Result};
use crate::{Capability, FileInfo, Volume};
use async_trait::async_trait;
use exn::OptionExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of volume names and the host directory each one is mounted at.
pub trait VolumeTable: Send + Sync {
    /// Volumes currently available on the host.
    fn volume_names(&self) -> std::io::Result<Vec<String>>;

    /// Host directory for a volume, or `None` if the volume doesn't exist.
    fn mount_point(&self, volume: &str) -> Option<PathBuf>;
}

/// Drive letters of the host (`A:` through `Z:`), found by checking which
/// drive roots exist.
///
/// A drive root only reads as a directory when media is present, so empty
/// removable drives (an optical drive with no disc) are not listed. Such a
/// drive can still be addressed by name through [`mount_point`](VolumeTable::mount_point).
#[derive(Clone, Copy, Debug, Default)]
pub struct HostDrives;

impl HostDrives {
    const LETTERS: &'static str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    fn is_drive(volume: &str) -> bool {
        let bytes = volume.as_bytes();
        bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
    }
}

impl VolumeTable for HostDrives {
    fn volume_names(&self) -> std::io::Result<Vec<String>> {
        Ok(Self::LETTERS
            .chars()
            .map(|letter| format!("{letter}:"))
            .filter(|drive| Path::new(&format!("{drive}/")).is_dir())
            .collect())
    }

    fn mount_point(&self, volume: &str) -> Option<PathBuf> {
        Self::is_drive(volume).then(|| PathBuf::from(format!("{}/", volume.to_ascii_uppercase())))
    }
}

/// Fixed mapping of volume names to host directories.
#[derive(Clone, Debug, Default)]
pub struct MountTable {
    mounts: BTreeMap<String, PathBuf>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mount(mut self, volume: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.mounts.insert(volume.into(), root.into());
        self
    }
}

impl VolumeTable for MountTable {
    fn volume_names(&self) -> std::io::Result<Vec<String>> {
        Ok(self.mounts.keys().cloned().collect())
    }

    fn mount_point(&self, volume: &str) -> Option<PathBuf> {
        self.mounts.get(volume).cloned()
    }
}

/// A root spanning several independent volumes.
///
/// `.` and `/` are a synthetic directory with one entry per volume. Any other
/// path starts with a volume name, e.g. `C:/Users/me` or `C:`, and is routed
/// to that volume's [`LocalBackend`] with the remainder (default `.`).
#[derive(Clone)]
pub struct MultiVolumeRoot {
    table: Arc<dyn VolumeTable>,
}

impl MultiVolumeRoot {
    pub fn new(table: impl VolumeTable + 'static) -> Self {
        Self { table: Arc::new(table) }
    }

    fn is_synthetic_root(path: &Path) -> bool {
        matches!(path.to_str(), Some("" | "." | "/"))
    }

    /// Split `path` into its volume name and the remainder.
    fn split(path: &Path) -> (String, PathBuf) {
        let raw = path.to_string_lossy().replace('\\', "/");
        let trimmed = raw.trim_start_matches('/');
        let (volume, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
        let rest = rest.trim_start_matches('/');
        let rest = if rest.is_empty() { "." } else { rest };
        (volume.to_string(), PathBuf::from(rest))
    }

    /// Resolve `path` to the owning volume's backend and a path relative to it.
    fn resolve(&self, op: &'static str, path: &Path) -> Result<(String, LocalBackend, PathBuf)> {
        if Self::is_synthetic_root(path) {
            exn::bail!(ErrorKind::invalid_path(op, path));
        }
        let (volume, rest) = Self::split(path);
        let mount = self.table.mount_point(&volume).ok_or_raise(|| ErrorKind::UnknownVolume(volume.clone()))?;
        Ok((volume, LocalBackend::new(mount)?, rest))
    }

    fn volume_entries(&self) -> Result<Vec<FileInfo>> {
        let names = self.table.volume_names().map_err(ErrorKind::Io)?;
        Ok(names.into_iter().map(FileInfo::synthetic_dir).collect())
    }

    async fn open(&self, path: &Path) -> Result<BoxSyncRead> {
        let (_, backend, rest) = self.resolve("open", path)?;
        backend.open(&rest).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        if Self::is_synthetic_root(path) {
            return self.volume_entries();
        }
        let (_, backend, rest) = self.resolve("readdir", path)?;
        Backend::read_dir(&backend, &rest).await
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        if Self::is_synthetic_root(path) {
            return Ok(FileInfo::synthetic_dir(path.to_string_lossy()));
        }
        let (volume, backend, rest) = self.resolve("stat", path)?;
        let mut info = backend.stat(&rest).await?;
        if rest == Path::new(".") {
            info.name = volume;
        }
        Ok(info)
    }

    fn host_path(&self, path: &Path) -> Option<PathBuf> {
        let (_, backend, rest) = self.resolve("resolve", path).ok()?;
        backend.host_path(&rest)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let (from_volume, backend, from_rest) = self.resolve("rename", from)?;
        let (to_volume, _, to_rest) = self.resolve("rename", to)?;
        // Moves across volumes are never emulated with copy+delete.
        if from_volume != to_volume {
            exn::bail!(ErrorKind::InvalidArgument { op: "rename", path: from.to_path_buf() });
        }
        backend.rename(&from_rest, &to_rest).await
    }
}

/// The host's whole filesystem as one backend.
///
/// Selected once at startup with [`detect()`](Self::detect); both variants
/// satisfy the full [`Volume`] contract.
#[derive(Clone)]
pub enum RootBackend {
    /// Unix-like hosts: everything lives under `/`.
    Single(LocalBackend),
    /// Hosts with independent drives.
    Multi(MultiVolumeRoot),
}

impl RootBackend {
    /// Pick the variant matching the host platform.
    pub fn detect() -> Result<Self> {
        if cfg!(windows) {
            tracing::debug!("Using multi-volume root backend");
            return Ok(Self::Multi(MultiVolumeRoot::new(HostDrives)));
        }
        Ok(Self::Single(LocalBackend::new("/")?))
    }

    /// Names of the volumes under this root. A single-root host has exactly
    /// one unnamed volume.
    pub fn volume_names(&self) -> Result<Vec<String>> {
        match self {
            Self::Single(_) => Ok(vec![String::new()]),
            Self::Multi(multi) => Ok(multi.table.volume_names().map_err(ErrorKind::Io)?),
        }
    }

    /// Resolve a mutating operation to a volume backend and relative path.
    fn route(&self, op: &'static str, path: &Path) -> Result<(LocalBackend, PathBuf)> {
        match self {
            Self::Single(local) => Ok((local.clone(), path.to_path_buf())),
            Self::Multi(multi) => multi.resolve(op, path).map(|(_, backend, rest)| (backend, rest)),
        }
    }
}

#[async_trait]
impl Backend for RootBackend {
    async fn open(&self, path: &Path) -> Result<BoxSyncRead> {
        match self {
            Self::Single(local) => local.open(path).await,
            Self::Multi(multi) => multi.open(path).await,
        }
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        match self {
            Self::Single(local) => Backend::read_dir(local, path).await,
            Self::Multi(multi) => multi.read_dir(path).await,
        }
    }

    fn capabilities(&self) -> Option<Capability> {
        Some(Capability::ALL)
    }

    fn host_path(&self, path: &Path) -> Option<PathBuf> {
        match self {
            Self::Single(local) => local.host_path(path),
            Self::Multi(multi) => multi.host_path(path),
        }
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

    fn truncate_fs(self: Arc<Self>) -> Option<Arc<dyn TruncateFs>> {
        Some(self)
    }
}

impl Volume for RootBackend {}

#[async_trait]
impl StatFs for RootBackend {
    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        match self {
            Self::Single(local) => local.stat(path).await,
            Self::Multi(multi) => multi.stat(path).await,
        }
    }
}

#[async_trait]
impl OpenWriterFs for RootBackend {
    async fn open_writer(&self, path: &Path, flags: WriteFlags) -> Result<BoxSyncWrite> {
        let (backend, rest) = self.route("open", path)?;
        backend.open_writer(&rest, flags).await
    }
}

#[async_trait]
impl TruncateFs for RootBackend {
    async fn truncate(&self, path: &Path, size: u64) -> Result<()> {
        let (backend, rest) = self.route("truncate", path)?;
        backend.truncate(&rest, size).await
    }
}

#[async_trait]
impl RemoveFs for RootBackend {
    async fn remove(&self, path: &Path) -> Result<()> {
        let (backend, rest) = self.route("remove", path)?;
        backend.remove(&rest).await
    }
}

#[async_trait]
impl MkdirFs for RootBackend {
    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        let (backend, rest) = self.route("mkdir", path)?;
        backend.mkdir(&rest, mode).await
    }
}

#[async_trait]
impl RenameFs for RootBackend {
    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        match self {
            Self::Single(local) => local.rename(from, to).await,
            Self::Multi(multi) => multi.rename(from, to).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Read;

    struct Fixture {
        _c: tempfile::TempDir,
        _d: tempfile::TempDir,
        root: RootBackend,
    }

    fn multi() -> Fixture {
        let c = tempfile::tempdir().unwrap();
        let d = tempfile::tempdir().unwrap();
        std::fs::write(c.path().join("hello.txt"), b"from C").unwrap();
        std::fs::create_dir(c.path().join("docs")).unwrap();
        let table = MountTable::new().with_mount("C:", c.path()).with_mount("D:", d.path());
        let root = RootBackend::Multi(MultiVolumeRoot::new(table));
        Fixture { _c: c, _d: d, root }
    }

    #[rstest]
    #[case("C:", "C:", ".")]
    #[case("C:/", "C:", ".")]
    #[case("/C:/Users/me", "C:", "Users/me")]
    #[case("D:/a//b", "D:", "a//b")]
    #[case("C:\\Windows\\System32", "C:", "Windows/System32")]
    fn test_split(#[case] input: &str, #[case] volume: &str, #[case] rest: &str) {
        assert_eq!(MultiVolumeRoot::split(Path::new(input)), (volume.to_string(), PathBuf::from(rest)));
    }

    #[test]
    fn test_drive_mount_points() {
        assert_eq!(HostDrives.mount_point("c:"), Some(PathBuf::from("C:/")));
        assert_eq!(HostDrives.mount_point("home"), None);
        assert_eq!(HostDrives.mount_point("CC:"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_drive_listing_skips_missing_roots() {
        // No `X:/` directories exist on a unix host, yet each drive is still addressable.
        assert_eq!(HostDrives.volume_names().unwrap(), Vec::<String>::new());
        assert_eq!(HostDrives.mount_point("D:"), Some(PathBuf::from("D:/")));
    }

    #[test]
    fn test_single_root_volume_names() {
        let root = RootBackend::Single(LocalBackend::new("/").unwrap());
        assert_eq!(root.volume_names().unwrap(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_synthetic_root_listing() {
        let fixture = multi();
        for root_path in [".", "/"] {
            let entries = fixture.root.read_dir(Path::new(root_path)).await.unwrap();
            let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["C:", "D:"]);
            assert!(entries.iter().all(|e| e.is_dir && e.size == 0 && e.modified.is_none()));
            let info = fixture.root.stat(Path::new(root_path)).await.unwrap();
            assert!(info.is_dir);
            assert!(info.modified.is_none());
        }
    }

    #[tokio::test]
    async fn test_routes_to_volume() {
        let fixture = multi();
        let mut buf = String::new();
        fixture.root.open(Path::new("C:/hello.txt")).await.unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "from C");
        let volume = fixture.root.stat(Path::new("C:")).await.unwrap();
        assert_eq!(volume.name, "C:");
        assert!(volume.is_dir);
        let mut names: Vec<_> =
            fixture.root.read_dir(Path::new("C:/")).await.unwrap().into_iter().map(|e| e.name).collect();
        names.sort();
        assert_eq!(names, vec!["docs", "hello.txt"]);
    }

    #[tokio::test]
    async fn test_unknown_volume() {
        let fixture = multi();
        let err = fixture.root.stat(Path::new("Q:/file")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownVolume(v) if v == "Q:"));
    }

    #[tokio::test]
    async fn test_rename_across_volumes_fails() {
        let fixture = multi();
        let err = fixture.root.rename(Path::new("C:/hello.txt"), Path::new("D:/hello.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument { op: "rename", .. }));
        // Nothing moved, nothing copied
        assert!(fixture.root.stat(Path::new("C:/hello.txt")).await.is_ok());
        assert!(fixture.root.stat(Path::new("D:/hello.txt")).await.is_err());
    }

    #[tokio::test]
    async fn test_rename_within_volume() {
        let fixture = multi();
        fixture.root.rename(Path::new("C:/hello.txt"), Path::new("C:/docs/hello.txt")).await.unwrap();
        assert!(fixture.root.stat(Path::new("C:/docs/hello.txt")).await.is_ok());
        assert!(fixture.root.stat(Path::new("C:/hello.txt")).await.is_err());
    }

    #[tokio::test]
    async fn test_mutating_synthetic_root_fails() {
        let fixture = multi();
        let err = fixture.root.mkdir(Path::new("/"), 0o755).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath { op: "mkdir", .. }));
        let err = fixture.root.remove(Path::new(".")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath { op: "remove", .. }));
    }

    #[tokio::test]
    async fn test_escape_from_volume_fails() {
        let fixture = multi();
        let err = fixture.root.remove(Path::new("D:/../escape")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn test_single_root_delegates() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = RootBackend::Single(LocalBackend::new(temp_dir.path()).unwrap());
        root.mkdir(Path::new("new"), 0o755).await.unwrap();
        root.rename(Path::new("new"), Path::new("renamed")).await.unwrap();
        assert!(root.stat(Path::new("renamed")).await.unwrap().is_dir);
        assert_eq!(root.volume_names().unwrap(), vec![String::new()]);
    }
}
