//! Thumbnail Error Types
//!
//! Thumbnail generation never fails loudly: these errors end up in a log
//! line and the request simply resolves without a path.

use derive_more::{Display, Error};

/// A thumbnail error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for thumbnail operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The source could not be read from its volume.
    #[display("cannot read thumbnail source")]
    Storage,
    /// The source is not an image the decoder understands.
    #[display("cannot decode source image")]
    Decode,
    /// The thumbnail could not be encoded as JPEG.
    #[display("cannot encode thumbnail")]
    Encode,
    /// Reading or writing the cache directory failed.
    #[display("thumbnail cache I/O failed")]
    Io,
    /// Video thumbnails need an ffmpeg executable.
    #[display("ffmpeg path is not configured")]
    ToolNotConfigured,
    /// ffmpeg exited unsuccessfully. Killed by signal is reported as `-1`.
    #[display("ffmpeg exited with code: {_0}")]
    ToolFailed(#[error(not(source))] i32),
    /// ffmpeg exited successfully but left no frame behind.
    #[display("ffmpeg produced no output")]
    NoOutput,
    /// The job ran past its deadline.
    #[display("thumbnail generation timed out")]
    Timeout,
    /// The volume cannot hand this source to an external tool.
    #[display("source has no host path")]
    Unsupported,
    /// The pipeline's dispatcher could not be started.
    #[display("thumbnail dispatcher unavailable")]
    Dispatcher,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Timeout | Self::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Io, "thumbnail cache I/O failed")]
    #[case(ErrorKind::Timeout, "thumbnail generation timed out")]
    #[case(ErrorKind::ToolFailed(1), "ffmpeg exited with code: 1")]
    fn test_display(#[case] kind: ErrorKind, #[case] expected: &str) {
        assert_eq!(kind.to_string(), expected);
    }
}
