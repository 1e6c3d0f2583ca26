//! Transport helpers shared by the catalog and directory clients.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

/// Header naming the wire schema version of every request.
pub(crate) const SCHEMA_VERSION_HEADER: &str = "x-schema-version";

/// Wire schema version spoken by these clients.
pub(crate) const SCHEMA_VERSION: &str = "1";

const USER_AGENT: &str = concat!("registrar/", env!("CARGO_PKG_VERSION"));

/// Errors raised while constructing a client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The base URL cannot carry path segments.
    #[error("invalid base URL {0}: must be an absolute http(s) URL")]
    InvalidBaseUrl(String),

    /// The underlying reqwest client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub(crate) fn build_client(base_url: &Url, timeout: Duration) -> Result<Client, ClientBuildError> {
    if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
        return Err(ClientBuildError::InvalidBaseUrl(base_url.to_string()));
    }
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(SCHEMA_VERSION_HEADER),
        HeaderValue::from_static(SCHEMA_VERSION),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()?)
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // Base URLs are validated in `build_client`.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

pub(crate) fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else {
        format!("request failed: {error}")
    }
}

/// Statuses worth retrying: the server may answer differently next time.
pub(crate) fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS
        )
}

pub(crate) fn describe_status(status: StatusCode, body: &[u8]) -> String {
    let preview = body_preview(body);
    if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {preview}", status.as_u16())
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        let preview: String = compact.chars().take(PREVIEW_CHAR_LIMIT).collect();
        format!("{preview}...")
    } else {
        compact
    }
}
