//! Video thumbnails, extracted by an external ffmpeg process.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use filer_vfs::Volume;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Seconds into the video to grab the frame from on the first attempt.
const SEEK_SECONDS: &str = "3";
const SCALE_FILTER: &str = "scale=200:-1";

/// Extract one frame of `source` into `cache_path`.
///
/// Remote `http(s)://` sources are handed to ffmpeg as URLs, with the host
/// resolved up front; anything else must have a host path on `volume`. If
/// seeking past the end of a short video leaves no frame, the extraction is
/// retried once from the start.
pub(crate) async fn generate(
    ffmpeg: Option<&Path>,
    volume: &dyn Volume,
    source: &str,
    cache_path: &Path,
) -> Result<()> {
    let ffmpeg = ffmpeg.ok_or_raise(|| ErrorKind::ToolNotConfigured)?;
    let input: OsString = match is_remote(source) {
        true => source.into(),
        false => volume.host_path(Path::new(source)).ok_or_raise(|| ErrorKind::Unsupported)?.into_os_string(),
    };

    let cache_dir = cache_path.parent().unwrap_or(Path::new("."));
    let output = tempfile::Builder::new().suffix(".jpeg").tempfile_in(cache_dir).or_raise(|| ErrorKind::Io)?;
    let out = output.path().as_os_str().to_os_string();

    let mut args: Vec<OsString> = Vec::new();
    let mut seek_input = input.clone();
    if is_remote(source) {
        if let Some(resolved) = resolve(source).await {
            args.extend([OsString::from("-headers"), OsString::from(format!("Host: {}", resolved.host_header))]);
            seek_input = resolved.url.into();
        }
    }
    args.extend(["-ss".into(), SEEK_SECONDS.into(), "-i".into(), seek_input]);
    args.extend(frame_args(out.clone()));
    run(ffmpeg, &args).await?;

    if !crate::cache::is_present(output.path()).await {
        tracing::info!(source, "No frame at seek offset; retrying from the start");
        let mut retry: Vec<OsString> = vec!["-i".into(), input];
        retry.extend(frame_args(out));
        run(ffmpeg, &retry).await?;
    }
    if !crate::cache::is_present(output.path()).await {
        exn::bail!(ErrorKind::NoOutput);
    }
    output.persist(cache_path).or_raise(|| ErrorKind::Io)?;
    tracing::debug!(path = %cache_path.display(), "Video thumbnail written");
    Ok(())
}

fn frame_args(out: OsString) -> Vec<OsString> {
    let mut args: Vec<OsString> =
        ["-vframes", "1", "-vcodec", "mjpeg", "-an", "-vf", SCALE_FILTER, "-y"].map(OsString::from).into();
    args.push(out);
    args
}

async fn run(ffmpeg: &Path, args: &[OsString]) -> Result<()> {
    tracing::debug!(ffmpeg = %ffmpeg.display(), ?args, "Running ffmpeg");
    let output = Command::new(ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .or_raise(|| ErrorKind::Io)?;
    match output.status.success() {
        true => Ok(()),
        false => {
            tracing::debug!(stderr = %String::from_utf8_lossy(&output.stderr), "ffmpeg failed");
            exn::bail!(ErrorKind::ToolFailed(output.status.code().unwrap_or(-1)))
        },
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// The parts of an `http(s)` URL needed to swap its host for an address.
#[derive(Debug, PartialEq, Eq)]
struct RemoteUrl<'a> {
    /// Everything up to and including `://`, plus any `user@`.
    prefix: &'a str,
    /// `host` or `host:port`, as written.
    authority: &'a str,
    host: &'a str,
    /// Explicit port, if the URL has one.
    port: Option<u16>,
    /// Port implied by the scheme.
    default_port: u16,
    /// Path, query and fragment.
    rest: &'a str,
}

impl<'a> RemoteUrl<'a> {
    fn parse(url: &'a str) -> Option<Self> {
        let (scheme, after) = url.split_once("://")?;
        let default_port = match scheme {
            "http" => 80,
            "https" => 443,
            _ => return None,
        };
        let end = after.find(['/', '?', '#']).unwrap_or(after.len());
        let (authority_with_user, rest) = after.split_at(end);
        let user_len = authority_with_user.rfind('@').map_or(0, |at| at + 1);
        let authority = &authority_with_user[user_len..];
        let prefix = &url[..scheme.len() + 3 + user_len];

        let (host, port) = match authority.strip_prefix('[') {
            Some(bracketed) => {
                let (host, tail) = bracketed.split_once(']')?;
                match tail {
                    "" => (host, None),
                    _ => (host, Some(tail.strip_prefix(':')?)),
                }
            },
            None => match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            },
        };
        // Anything else bracket- or colon-shaped is a malformed authority.
        if host.contains(['[', ']']) || (!authority.starts_with('[') && host.contains(':')) {
            return None;
        }
        let port = port.map(str::parse).transpose().ok()?;
        match host.is_empty() {
            true => None,
            false => Some(Self { prefix, authority, host, port, default_port, rest }),
        }
    }
}

struct Resolved {
    url: String,
    host_header: String,
}

/// Resolve the URL's host to an address and rewrite the URL to use it.
///
/// `None` when the URL can't be parsed or the host doesn't resolve; the
/// caller then passes the URL through untouched.
async fn resolve(url: &str) -> Option<Resolved> {
    let remote = RemoteUrl::parse(url)?;
    tracing::debug!(host = remote.host, "Resolving video host");
    let address = match tokio::net::lookup_host((remote.host, remote.port.unwrap_or(remote.default_port))).await {
        Ok(mut addresses) => addresses.next()?,
        Err(err) => {
            tracing::debug!(host = remote.host, error = %err, "Cannot resolve video host");
            return None;
        },
    };
    let ip = match address.ip() {
        std::net::IpAddr::V4(ip) => ip.to_string(),
        std::net::IpAddr::V6(ip) => format!("[{ip}]"),
    };
    let authority = match remote.port {
        Some(port) => format!("{ip}:{port}"),
        None => ip,
    };
    Some(Resolved {
        url: format!("{}{authority}{}", remote.prefix, remote.rest),
        host_header: remote.authority.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://example.com/v.mp4", "http://", "example.com", "example.com", None, 80, "/v.mp4")]
    #[case("https://example.com:8443/v?x=1", "https://", "example.com:8443", "example.com", Some(8443), 443, "/v?x=1")]
    #[case("https://user:pw@cdn.example.com", "https://user:pw@", "cdn.example.com", "cdn.example.com", None, 443, "")]
    #[case("http://[::1]:8080/v", "http://", "[::1]:8080", "::1", Some(8080), 80, "/v")]
    fn test_parse_remote_url(
        #[case] url: &str,
        #[case] prefix: &str,
        #[case] authority: &str,
        #[case] host: &str,
        #[case] port: Option<u16>,
        #[case] default_port: u16,
        #[case] rest: &str,
    ) {
        assert_eq!(RemoteUrl::parse(url), Some(RemoteUrl { prefix, authority, host, port, default_port, rest }));
    }

    #[rstest]
    #[case("ftp://example.com/v.mp4")]
    #[case("http:///v.mp4")]
    #[case("http://example.com:notaport/v.mp4")]
    #[case("videos/local.mp4")]
    #[case("http://[::1]junk/v.mp4")]
    #[case("http://[::1]:/v.mp4")]
    #[case("http://::1:8080/v.mp4")]
    #[case("http://exa]mple.com/v.mp4")]
    fn test_parse_rejects(#[case] url: &str) {
        assert_eq!(RemoteUrl::parse(url), None);
    }

    #[tokio::test]
    async fn test_resolve_ip_literal_keeps_port_and_header() {
        let resolved = resolve("http://127.0.0.1:8080/clip.mp4").await.unwrap();
        assert_eq!(resolved.url, "http://127.0.0.1:8080/clip.mp4");
        assert_eq!(resolved.host_header, "127.0.0.1:8080");
    }

    #[test]
    fn test_frame_args_end_with_output() {
        let args = frame_args("out.jpeg".into());
        assert_eq!(args[6], OsString::from("scale=200:-1"));
        assert_eq!(args[8], OsString::from("out.jpeg"));
    }
}
