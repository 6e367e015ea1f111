use crate::error::Result;
use crate::{SourceKind, ThumbnailConfig, picture, video};
use filer_vfs::VolumeHandle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

/// Hard limit on a single thumbnail job, including any ffmpeg process.
pub const JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// One thumbnail to generate, run on the dispatcher.
pub(crate) struct Job {
    pub(crate) volume: VolumeHandle,
    pub(crate) kind: SourceKind,
    pub(crate) source: String,
    pub(crate) cache_path: PathBuf,
    pub(crate) config: Arc<ThumbnailConfig>,
}

impl Job {
    /// Generate the thumbnail. Failures are logged, never returned: the
    /// waiting request just finds no cache file.
    #[instrument(skip_all, fields(kind = ?self.kind, source = %self.source))]
    pub(crate) async fn run(self) {
        let deadline = Instant::now() + JOB_TIMEOUT;
        tracing::debug!(path = %self.cache_path.display(), "Generating thumbnail");
        match tokio::time::timeout_at(deadline, self.generate(deadline)).await {
            Ok(Ok(())) => {},
            Ok(Err(err)) => tracing::warn!(error = ?err, "Failed to generate thumbnail"),
            Err(_) => tracing::warn!(timeout = ?JOB_TIMEOUT, "Thumbnail generation timed out"),
        }
    }

    async fn generate(&self, deadline: Instant) -> Result<()> {
        match self.kind {
            SourceKind::Video => {
                let ffmpeg = self.config.ffmpeg_path.as_deref();
                video::generate(ffmpeg, self.volume.as_ref(), &self.source, &self.cache_path).await
            },
            SourceKind::Image | SourceKind::Archive => {
                picture::generate(self.volume.as_ref(), Path::new(&self.source), &self.cache_path, deadline).await
            },
        }
    }
}
