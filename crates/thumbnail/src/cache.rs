//! Cache file naming and presence checks.

use std::path::{Path, PathBuf};

/// Extension of every cached thumbnail.
pub const EXTENSION: &str = "jpeg";

/// Cache id for `source`: the explicit id when one is given, otherwise the
/// hex BLAKE3 digest of the source string.
pub fn cache_id(source: &str, explicit: Option<&str>) -> String {
    match explicit.filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => blake3::hash(source.as_bytes()).to_hex().to_string(),
    }
}

pub fn cache_path(cache_dir: &Path, cache_id: &str) -> PathBuf {
    cache_dir.join(format!("{cache_id}.{EXTENSION}"))
}

/// Whether a usable thumbnail exists at `path`. Empty files don't count.
pub(crate) async fn is_present(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|metadata| metadata.is_file() && metadata.len() > 0)
}
