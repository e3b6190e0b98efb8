//! Downloader: streamed HTTP GET into a caller-owned destination
//!
//! One GET per call, with the body copied chunk-by-chunk into any
//! [`AsyncWrite`] destination, so memory stays bounded regardless of body
//! size. Alongside the byte count the caller gets a suggested filename,
//! resolved from the `Content-Disposition` header when present, from the
//! last URL path segment otherwise, and always sanitized down to a safe
//! non-empty basename.

use futures::StreamExt;
use reqwest::header::HeaderMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::utils::{FALLBACK_FILENAME, sanitize_filename};

/// What a completed download produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Suggested filename: `Content-Disposition` first, URL path second,
    /// `"download"` as last resort, always sanitized and never empty
    pub filename: String,
    /// Number of body bytes written to the destination
    pub bytes_written: u64,
}

/// Download `url` into `dest` with a one-off HTTP client
///
/// The body is streamed; nothing larger than one transfer chunk is buffered.
/// The destination is flushed before returning. Callers issuing many
/// downloads should build a [`reqwest::Client`] once and use
/// [`download_with`] instead.
///
/// # Errors
///
/// - [`Error::DownloadConnection`] when the request cannot be sent or the
///   body transfer breaks mid-stream
/// - [`Error::DownloadStatus`] when the server answers with a non-success
///   status; nothing is written to `dest` in that case
/// - [`Error::Io`] when writing to `dest` fails
///
/// # Examples
///
/// ```no_run
/// # async fn demo() -> groundcrew::Result<()> {
/// let mut file = tokio::fs::File::create("/tmp/archive.tar.gz").await?;
/// let outcome = groundcrew::download("https://example.com/archive.tar.gz", &mut file).await?;
/// println!("saved {} ({} bytes)", outcome.filename, outcome.bytes_written);
/// # Ok(())
/// # }
/// ```
pub async fn download<W>(url: &str, dest: &mut W) -> Result<DownloadOutcome>
where
    W: AsyncWrite + Unpin,
{
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| Error::DownloadConnection {
            url: url.to_string(),
            source: e,
        })?;
    download_with(&client, url, dest).await
}

/// Download `url` into `dest` using the caller's HTTP client
///
/// Same semantics and errors as [`download`]; the client's connection pool
/// is reused across calls.
pub async fn download_with<W>(
    client: &reqwest::Client,
    url: &str,
    dest: &mut W,
) -> Result<DownloadOutcome>
where
    W: AsyncWrite + Unpin,
{
    debug!(url, "starting download");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::DownloadConnection {
            url: url.to_string(),
            source: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::DownloadStatus {
            url: url.to_string(),
            status,
        });
    }

    let filename = resolve_filename(response.headers(), url);

    let mut bytes_written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::DownloadConnection {
            url: url.to_string(),
            source: e,
        })?;
        dest.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
    }
    dest.flush().await?;

    info!(url, filename = %filename, bytes = bytes_written, "download complete");

    Ok(DownloadOutcome {
        filename,
        bytes_written,
    })
}

/// Pick the best available filename, then sanitize it.
fn resolve_filename(headers: &HeaderMap, url: &str) -> String {
    let raw = filename_from_headers(headers)
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
    sanitize_filename(&raw).into_owned()
}

/// Filename from a `Content-Disposition` header, either the plain
/// `filename=` form or the RFC 5987 `filename*=charset'lang'encoded` form.
/// When both parse, the plain form wins.
fn filename_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers
        .get(reqwest::header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;

    let mut extended = None;
    for part in value.split(';') {
        let part = part.trim();
        if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"');
            if !name.is_empty() {
                return Some(name.to_string());
            }
        } else if extended.is_none()
            && let Some(encoded) = part.strip_prefix("filename*=")
            && let Some(idx) = encoded.rfind('\'')
            && let Ok(decoded) = urlencoding::decode(&encoded[idx + 1..])
            && !decoded.is_empty()
        {
            extended = Some(decoded.into_owned());
        }
    }
    extended
}

/// Last non-empty path segment of the request URL.
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}
