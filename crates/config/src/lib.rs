//! Layered configuration: built-in defaults, then an optional file, then
//! `FILER_*` environment variables.
//!
//! Nested keys use a double underscore in the environment, so
//! `FILER_THUMBNAIL__FFMPEG_PATH=/usr/bin/ffmpeg` sets `thumbnail.ffmpeg_path`.

pub mod error;

pub use crate::error::{Error, ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
pub use filer_thumbnail::ThumbnailConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "FILER_";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory to serve. `None` serves the whole host: `/`, or every
    /// drive on multi-volume hosts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    pub thumbnail: ThumbnailConfig,
}

impl Config {
    /// `config.toml` in the platform config directory, if there is one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "filer").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the file at
    /// [`default_path`](Self::default_path) is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.is_file()),
        };
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = &file {
            tracing::debug!(path = %file.display(), "Loading config file");
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => exn::bail!(ErrorKind::UnknownFormat(file.clone())),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract::<Self>().or_raise(|| ErrorKind::Load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[rstest]
    #[case("filer.toml", "root = \"/srv/files\"\n[thumbnail]\ncache_dir = \"/var/cache/filer\"\n")]
    #[case("filer.yaml", "root: /srv/files\nthumbnail:\n  cache_dir: /var/cache/filer\n")]
    #[case("filer.json", r#"{"root": "/srv/files", "thumbnail": {"cache_dir": "/var/cache/filer"}}"#)]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file(name, contents)?;
            let config = Config::load(Some(Path::new(name))).unwrap();
            assert_eq!(config.root.as_deref(), Some(Path::new("/srv/files")));
            assert_eq!(config.thumbnail.cache_dir, Path::new("/var/cache/filer"));
            assert_eq!(config.thumbnail.ffmpeg_path, None);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("filer.toml", "[thumbnail]\ncache_dir = \"/from/file\"\nffmpegPath = \"/opt/ffmpeg\"\n")?;
            jail.set_env("FILER_THUMBNAIL__CACHE_DIR", "/from/env");
            let config = Config::load(Some(Path::new("filer.toml"))).unwrap();
            assert_eq!(config.thumbnail.cache_dir, Path::new("/from/env"));
            assert_eq!(config.thumbnail.ffmpeg_path.as_deref(), Some(Path::new("/opt/ffmpeg")));
            assert_eq!(config.root, None);
            Ok(())
        });
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|jail| {
            jail.set_env("FILER_THUMBNAIL__CACHE_DIR", "/from/env");
            let config = Config::load(None).unwrap();
            assert_eq!(config.thumbnail.cache_dir, Path::new("/from/env"));
            Ok(())
        });
    }

    #[test]
    fn test_file_errors() {
        Jail::expect_with(|jail| {
            let err = Config::load(Some(Path::new("missing.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::NotFound(_)));

            jail.create_file("filer.ini", "root=/")?;
            let err = Config::load(Some(Path::new("filer.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::UnknownFormat(_)));

            jail.create_file("broken.toml", "thumbnail = 42")?;
            let err = Config::load(Some(Path::new("broken.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }
}
