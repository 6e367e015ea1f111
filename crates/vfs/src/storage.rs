//! Top-level storage facade used by listing and transfer layers.

use crate::backend::Backend;
use crate::{Capability, VolumeHandle, capability, wrap};
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// A backend presented as a [`Volume`](crate::Volume), with per-path
/// permission checks layered on top of the volume's capabilities.
pub struct Storage {
    volume: VolumeHandle,
    caps: OnceLock<Capability>,
}

impl Storage {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { volume: wrap(backend), caps: OnceLock::new() }
    }

    pub fn volume(&self) -> &VolumeHandle {
        &self.volume
    }

    /// What can be done at `path`.
    ///
    /// Starts from the volume's capabilities and drops everything but
    /// [`Capability::READ_ONLY`] when `path` can't be stat'ed or isn't
    /// writable by its owner.
    pub async fn caps(&self, path: &Path) -> Capability {
        let caps = *self.caps.get_or_init(|| {
            let backend: Arc<dyn Backend> = self.volume.clone();
            capability::derive(&backend)
        });
        match self.volume.stat(path).await {
            Ok(info) if info.is_writable() => caps,
            Ok(_) => {
                tracing::debug!(path = %path.display(), "Path is not writable, reporting read-only");
                caps & Capability::READ_ONLY
            },
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "Cannot stat path, reporting read-only");
                caps & Capability::READ_ONLY
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;

    fn fixture() -> (tempfile::TempDir, Storage) {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(Arc::new(LocalBackend::new(temp_dir.path()).unwrap()));
        (temp_dir, storage)
    }

    #[tokio::test]
    async fn test_writable_path_keeps_volume_caps() {
        let (temp_dir, storage) = fixture();
        std::fs::create_dir(temp_dir.path().join("docs")).unwrap();
        assert_eq!(storage.caps(Path::new("docs")).await, Capability::ALL);
    }

    #[tokio::test]
    async fn test_missing_path_is_read_only() {
        let (_temp_dir, storage) = fixture();
        assert_eq!(storage.caps(Path::new("nope")).await, Capability::READ_ONLY);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unwritable_path_is_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let (temp_dir, storage) = fixture();
        let locked = temp_dir.path().join("locked.txt");
        std::fs::write(&locked, b"x").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o444)).unwrap();
        assert_eq!(storage.caps(Path::new("locked.txt")).await, Capability::READ_ONLY);
        assert_eq!(storage.volume().capabilities(), Some(Capability::ALL));
    }
}
