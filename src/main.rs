//! `filer` command-line tool.
//!
//! Usage:
//!   filer caps home/me/photos
//!   filer ls home/me/photos
//!   filer thumb home/me/photos/cat.png --kind image
//!
//! Paths are relative to the configured root (the whole host by default).
//! Set `RUST_LOG=debug` for more detail on stderr.

mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use filer_config::Config;
use filer_thumbnail::Thumbnailer;
use filer_vfs::backend::{Backend, LocalBackend, RootBackend};
use filer_vfs::{FileInfo, Storage};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

/// How long `thumb` waits for a result before giving up.
const THUMBNAIL_WAIT: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(name = "filer")]
#[command(about = "Browse a capability-aware filesystem and its thumbnail cache")]
struct Args {
    /// Config file (TOML, YAML or JSON). Defaults to the platform config dir.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the operations allowed at a path
    Caps { path: PathBuf },
    /// List a directory
    Ls {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Print the cached thumbnail of a file, generating it if needed
    Thumb {
        path: String,
        /// image, video or archive
        #[arg(long, default_value = "image")]
        kind: String,
        /// Cache file name to use instead of one derived from the path
        #[arg(long)]
        cache_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "filer failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let backend = open_backend(&config)?;
    let storage = Storage::new(backend);

    match args.command {
        Command::Caps { path } => {
            let caps = storage.caps(relative(&path)).await;
            println!("{caps}");
        },
        Command::Ls { path } => {
            let entries = storage.volume().read_dir(relative(&path)).await.or_raise(|| ErrorKind::Storage)?;
            for entry in &entries {
                println!("{}", format_entry(entry));
            }
        },
        Command::Thumb { path, kind, cache_id } => {
            let source = relative(Path::new(&path)).to_string_lossy().into_owned();
            let thumbnails = Thumbnailer::start(config.thumbnail.discover_ffmpeg()).or_raise(|| ErrorKind::Thumbnail)?;
            let pending = thumbnails.request(Arc::clone(storage.volume()), &kind, &source, cache_id.as_deref()).await;
            match tokio::time::timeout(THUMBNAIL_WAIT, pending).await {
                Ok(Some(cached)) => println!("{}", cached.display()),
                Ok(None) => tracing::info!(path = %path, "No thumbnail available"),
                Err(_) => tracing::warn!(path = %path, timeout = ?THUMBNAIL_WAIT, "Gave up waiting for thumbnail"),
            }
            thumbnails.shutdown().await;
        },
    }
    Ok(())
}

fn open_backend(config: &Config) -> Result<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match &config.root {
        Some(root) => {
            let root = std::path::absolute(root).or_raise(|| ErrorKind::Storage)?;
            Arc::new(LocalBackend::new(root).or_raise(|| ErrorKind::Storage)?)
        },
        None => Arc::new(RootBackend::detect().or_raise(|| ErrorKind::Storage)?),
    };
    Ok(backend)
}

/// Paths on the command line may be written absolute; volumes want them
/// relative to their root.
fn relative(path: &Path) -> &Path {
    match path.strip_prefix("/") {
        Ok(rest) if rest.as_os_str().is_empty() => Path::new("."),
        Ok(rest) => rest,
        Err(_) => path,
    }
}

fn format_entry(entry: &FileInfo) -> String {
    match entry.is_dir {
        true => format!("{:>12}  {}/", "-", entry.name),
        false => format!("{:>12}  {}", entry.size, entry.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/", ".")]
    #[case("/home/me", "home/me")]
    #[case("photos/cat.png", "photos/cat.png")]
    #[case(".", ".")]
    fn test_relative(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(relative(Path::new(input)), Path::new(expected));
    }

    #[test]
    fn test_format_entry() {
        let dir = FileInfo { name: "photos".to_string(), size: 0, modified: None, is_dir: true, mode: 0o755 };
        let file = FileInfo { name: "cat.png".to_string(), size: 2048, modified: None, is_dir: false, mode: 0o644 };
        assert_eq!(format_entry(&dir), "           -  photos/");
        assert_eq!(format_entry(&file), "        2048  cat.png");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["filer", "thumb", "clip.mp4", "--kind", "video", "--cache-id", "c1"]).unwrap();
        match args.command {
            Command::Thumb { path, kind, cache_id } => {
                assert_eq!((path.as_str(), kind.as_str(), cache_id.as_deref()), ("clip.mp4", "video", Some("c1")));
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
