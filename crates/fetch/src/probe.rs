//! Metadata probe: filename and declared size from response headers.

use percent_encoding::percent_decode_str;
use reqwest::Url;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, HeaderMap};
use tracing::{debug, warn};

use crate::client::FetchClient;

/// What the remote resource says about itself. Neither field is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub filename: Option<String>,
    pub size: Option<u64>,
}

/// Probes `url` with a HEAD request.
///
/// Never fails: a server that rejects HEAD or cannot be reached yields
/// unknown size and a filename taken from the request URL.
pub async fn probe_metadata(client: &FetchClient, url: &Url) -> ResourceMetadata {
    let _permit = client.acquire(url).await;
    let result = client
        .http()
        .head(url.clone())
        .timeout(client.settings().probe_timeout)
        .send()
        .await;

    match result {
        Ok(response) => {
            let headers = response.headers();
            let disposition = headers
                .get(CONTENT_DISPOSITION)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
            let metadata = ResourceMetadata {
                filename: resolve_filename(disposition.as_deref(), response.url()),
                size: declared_size(headers),
            };
            debug!(
                url = %url,
                filename = ?metadata.filename,
                size = ?metadata.size,
                "metadata probed"
            );
            metadata
        }
        Err(e) => {
            warn!(url = %url, error = %e, "metadata probe failed, size unknown");
            ResourceMetadata {
                filename: resolve_filename(None, url),
                size: None,
            }
        }
    }
}

/// Resolves a filename from `Content-Disposition`, falling back to the last
/// path segment of `url`. Both sources are percent-decoded and reduced to a
/// bare file name.
pub fn resolve_filename(disposition: Option<&str>, url: &Url) -> Option<String> {
    disposition
        .and_then(filename_from_disposition)
        .or_else(|| filename_from_url(url))
}

fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;

    for param in value.split(';') {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            // RFC 5987 form: charset'language'percent-encoded-value
            "filename*" => {
                let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
                if let Some(name) = bare_name(&decode(strip_quotes(encoded))) {
                    return Some(name);
                }
            }
            "filename" => {
                if plain.is_none() {
                    plain = bare_name(&decode(strip_quotes(raw)));
                }
            }
            _ => {}
        }
    }

    plain
}

fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    bare_name(&decode(segment))
}

fn declared_size(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|&n| n > 0)
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'')
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Keeps only the final path component; `.`/`..` and blanks are discarded.
fn bare_name(candidate: &str) -> Option<String> {
    let base = candidate.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}
