use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where thumbnails are cached when no platform cache directory is known.
const FALLBACK_CACHE_DIR: &str = ".file_manager_cache";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Directory holding `<cache id>.jpeg` files. Created on demand.
    pub cache_dir: PathBuf,
    /// ffmpeg executable used for video thumbnails. Without it, video
    /// requests produce nothing.
    #[serde(alias = "ffmpegPath", skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        let cache_dir = ProjectDirs::from("", "", "filer")
            .map(|dirs| dirs.cache_dir().join("thumbnails"))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_CACHE_DIR));
        Self { cache_dir, ffmpeg_path: None }
    }
}

impl ThumbnailConfig {
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_ffmpeg(mut self, ffmpeg_path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = Some(ffmpeg_path.into());
        self
    }

    /// Fill in `ffmpeg_path` from `PATH` if it isn't configured.
    pub fn discover_ffmpeg(mut self) -> Self {
        if self.ffmpeg_path.is_none() {
            match which::which("ffmpeg") {
                Ok(path) => {
                    tracing::debug!(ffmpeg = %path.display(), "Discovered ffmpeg in PATH");
                    self.ffmpeg_path = Some(path);
                },
                Err(_) => tracing::info!("ffmpeg not found in PATH; video thumbnails disabled"),
            }
        }
        self
    }
}
