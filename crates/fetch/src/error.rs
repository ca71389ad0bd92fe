//! Error types for the inbound leg.

use std::time::Duration;

/// Why a submitted link was rejected.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("unsupported scheme `{0}`, only http and https links are accepted")]
    UnsupportedScheme(String),

    #[error("URL returned error code: {0}")]
    HttpStatus(u16),

    #[error("connection timed out while checking the link")]
    Timeout,

    #[error("could not reach URL: {0}")]
    Network(String),

    #[error("this looks like a web page, not a direct download link")]
    NotADirectLink,
}

/// Coarse rejection category shown to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    InvalidLink,
    Unreachable,
    NotADirectLink,
}

impl LinkError {
    /// Maps the rejection to its category.
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::InvalidUrl(_) | Self::UnsupportedScheme(_) => RejectionKind::InvalidLink,
            Self::HttpStatus(_) | Self::Timeout | Self::Network(_) => RejectionKind::Unreachable,
            Self::NotADirectLink => RejectionKind::NotADirectLink,
        }
    }
}

/// Errors produced while streaming a resource to disk.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP {0}: failed to download file")]
    HttpStatus(u16),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("download stalled: no data received for {}s", .0.as_secs())]
    Stalled(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}
