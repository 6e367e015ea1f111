//! On-demand thumbnail cache.
//!
//! [`Thumbnailer::request`] answers straight from the cache directory when
//! it can, and otherwise queues a generation job on a bounded
//! [`Dispatcher`]. Requests for the same cache file share one job. Every
//! failure is soft: the returned [`PendingThumbnail`] simply resolves to
//! `None`.
//!
//! ```no_run
//! use filer_thumbnail::{ThumbnailConfig, Thumbnailer};
//! use filer_vfs::backend::LocalBackend;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let thumbnails = Thumbnailer::start(ThumbnailConfig::default())?;
//! let volume = filer_vfs::wrap(Arc::new(LocalBackend::new("/srv/photos")?));
//! if let Some(path) = thumbnails.request(volume, "image", "cat.png", None).await.await {
//!     println!("{}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod config;
pub mod error;
mod job;
mod picture;
mod video;

pub use crate::cache::{cache_id, cache_path};
pub use crate::config::ThumbnailConfig;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::job::JOB_TIMEOUT;
pub use crate::picture::THUMBNAIL_WIDTH;
use crate::job::Job;
use exn::ResultExt;
use filer_dispatch::Dispatcher;
use filer_vfs::VolumeHandle;
use pin_project_lite::pin_project;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// What a thumbnail source is. Archives are thumbnailed like images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Video,
    Archive,
}

impl SourceKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "archive" => Some(Self::Archive),
            _ => None,
        }
    }
}

pin_project! {
    /// A thumbnail request in flight. Resolves once, to the cache file path
    /// or to `None` if no thumbnail could be produced.
    #[must_use = "futures do nothing unless polled"]
    pub struct PendingThumbnail {
        #[pin]
        receiver: oneshot::Receiver<PathBuf>,
    }
}

impl PendingThumbnail {
    fn channel() -> (oneshot::Sender<PathBuf>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }
}

impl Future for PendingThumbnail {
    type Output = Option<PathBuf>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().receiver.poll(cx).map(|received| received.ok())
    }
}

pub struct Thumbnailer {
    config: Arc<ThumbnailConfig>,
    dispatcher: Arc<Dispatcher>,
}

impl Thumbnailer {
    /// Jobs generating at once.
    pub const MAX_PARALLEL: usize = 8;
    /// Jobs waiting for a slot before new requests are turned away.
    pub const QUEUE_DEPTH: usize = 16;

    /// Build a pipeline on an existing dispatcher. Nothing is generated
    /// until that dispatcher is started.
    pub fn new(config: ThumbnailConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self { config: Arc::new(config), dispatcher }
    }

    /// Build a pipeline with its own running dispatcher. Must be called
    /// from within a tokio runtime.
    pub fn start(config: ThumbnailConfig) -> Result<Self> {
        let dispatcher = Arc::new(Dispatcher::new(Self::MAX_PARALLEL, Self::QUEUE_DEPTH));
        dispatcher.start().or_raise(|| ErrorKind::Dispatcher)?;
        Ok(Self::new(config, dispatcher))
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Stop generating. Queued requests resolve to `None`; running jobs are
    /// waited for.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    /// Request the thumbnail of `source` on `volume`.
    ///
    /// `kind` is `image`, `video` or `archive`; anything else never yields a
    /// thumbnail. `cache_id` overrides the cache file name, which otherwise
    /// derives from `source`.
    pub async fn request(
        &self,
        volume: VolumeHandle,
        kind: &str,
        source: &str,
        cache_id: Option<&str>,
    ) -> PendingThumbnail {
        let (sender, pending) = PendingThumbnail::channel();
        let cache_dir = &self.config.cache_dir;
        if let Err(err) = tokio::fs::create_dir_all(cache_dir).await {
            tracing::warn!(path = %cache_dir.display(), error = %err, "Cannot create thumbnail cache directory");
        }

        let cache_path = cache::cache_path(cache_dir, &cache::cache_id(source, cache_id));
        if cache::is_present(&cache_path).await {
            let _ = sender.send(cache_path);
            return pending;
        }
        let Some(kind) = SourceKind::parse(kind) else {
            tracing::trace!(kind, source, "No thumbnails for this kind of source");
            return pending;
        };

        let job = Job {
            volume,
            kind,
            source: source.to_string(),
            cache_path: cache_path.clone(),
            config: Arc::clone(&self.config),
        };
        let key = cache_path.to_string_lossy().into_owned();
        match self.dispatcher.try_submit_keyed(key, job.run()) {
            Some(task) => {
                tokio::spawn(async move {
                    task.wait().await;
                    if cache::is_present(&cache_path).await {
                        let _ = sender.send(cache_path);
                    }
                });
            },
            None => tracing::debug!(path = %cache_path.display(), "Thumbnail queue busy"),
        }
        pending
    }
}
