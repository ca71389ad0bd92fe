//! Link validation: is this a reachable, direct file resource?

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::client::FetchClient;
use crate::error::LinkError;

/// Parses a submitted link and checks its scheme and host.
pub fn parse_link(raw: &str) -> Result<Url, LinkError> {
    let url = Url::parse(raw.trim()).map_err(|e| LinkError::InvalidUrl(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(LinkError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(LinkError::InvalidUrl("missing host".into()));
    }

    Ok(url)
}

/// Classifies a HEAD response.
///
/// Any of `Content-Disposition`, `Content-Length` or a non-HTML content
/// type is enough to accept. Only the combination of none of the first two
/// and a `text/html` type is treated as a landing page.
pub fn classify_head(status: StatusCode, headers: &HeaderMap) -> Result<(), LinkError> {
    if status.as_u16() >= 400 {
        return Err(LinkError::HttpStatus(status.as_u16()));
    }

    let has_disposition = headers.contains_key(CONTENT_DISPOSITION);
    let has_length = headers.contains_key(CONTENT_LENGTH);
    let is_html = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"));

    if !has_disposition && !has_length && is_html {
        return Err(LinkError::NotADirectLink);
    }

    Ok(())
}

/// Validates a submitted link with a HEAD probe that follows redirects.
///
/// Read-only: nothing is downloaded.
pub async fn validate_link(client: &FetchClient, raw: &str) -> Result<Url, LinkError> {
    let url = parse_link(raw)?;

    let _permit = client.acquire(&url).await;
    let response = client
        .http()
        .head(url.clone())
        .timeout(client.settings().probe_timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                LinkError::Timeout
            } else {
                LinkError::Network(e.to_string())
            }
        })?;

    classify_head(response.status(), response.headers())?;

    debug!(
        url = %url,
        status = response.status().as_u16(),
        final_url = %response.url(),
        "link accepted"
    );
    Ok(url)
}
