//! Still-image thumbnails, decoded and scaled in-process.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use filer_vfs::Volume;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tokio::time::Instant;

/// Width of every still-image thumbnail. Height follows the aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 160;
const JPEG_QUALITY: u8 = 75;

/// Read `source` from `volume` and write its thumbnail to `cache_path`.
///
/// Decoding and encoding happen on a blocking thread. The file at
/// `cache_path` only ever appears complete.
pub(crate) async fn generate(volume: &dyn Volume, source: &Path, cache_path: &Path, deadline: Instant) -> Result<()> {
    let mut reader = volume.open(source).await.or_raise(|| ErrorKind::Storage)?;
    let cache_path = cache_path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).or_raise(|| ErrorKind::Storage)?;
        if Instant::now() >= deadline {
            exn::bail!(ErrorKind::Timeout);
        }
        render(&data, cache_path)
    })
    .await
    .or_raise(|| ErrorKind::Io)?
}

fn render(data: &[u8], cache_path: PathBuf) -> Result<()> {
    let source = image::load_from_memory(data).or_raise(|| ErrorKind::Decode)?;
    let height = scaled_height(source.width(), source.height());
    let thumbnail = source.resize_exact(THUMBNAIL_WIDTH, height, FilterType::Lanczos3).to_rgb8();

    let cache_dir = cache_path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(cache_dir).or_raise(|| ErrorKind::Io)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        thumbnail
            .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))
            .or_raise(|| ErrorKind::Encode)?;
        writer.flush().or_raise(|| ErrorKind::Io)?;
    }
    tmp.persist(&cache_path).or_raise(|| ErrorKind::Io)?;
    tracing::debug!(path = %cache_path.display(), width = THUMBNAIL_WIDTH, height, "Image thumbnail written");
    Ok(())
}

fn scaled_height(width: u32, height: u32) -> u32 {
    let scaled = u64::from(height) * u64::from(THUMBNAIL_WIDTH) / u64::from(width.max(1));
    u32::try_from(scaled.max(1)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(320, 240, 120)]
    #[case(160, 160, 160)]
    #[case(80, 20, 40)]
    #[case(4000, 1, 1)]
    fn test_scaled_height_keeps_aspect(#[case] width: u32, #[case] height: u32, #[case] expected: u32) {
        assert_eq!(scaled_height(width, height), expected);
    }

    #[test]
    fn test_render_rejects_garbage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache_path = temp_dir.path().join("garbage.jpeg");
        let err = render(b"definitely not an image", cache_path.clone()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Decode));
        assert!(!cache_path.exists());
    }
}
