//! Delivery transport trait and the types that cross it.
//!
//! The bot app implements this on top of the Bot API client. Using a trait
//! keeps relay and pipeline logic decoupled from HTTP and testable with mocks.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

/// Destination chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message previously sent through the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat: ChatId,
    pub message_id: i64,
}

/// Per-send timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendTimeouts {
    pub read: Duration,
    pub write: Duration,
    pub connect: Duration,
}

/// A file to deliver as a document.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub chat: ChatId,
    pub path: PathBuf,
    /// Name shown to the recipient.
    pub file_name: String,
    /// HTML caption.
    pub caption: String,
    /// Size on disk.
    pub size: u64,
    pub timeouts: SendTimeouts,
}

/// Errors returned by a delivery transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// Edit rejected because the content did not change.
    #[error("message is not modified")]
    NotModified,

    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Network,
    Timeout,
    Other,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "NetworkError",
            Self::Timeout => "TimedOut",
            Self::Other => "Error",
        };
        f.write_str(label)
    }
}

impl TransportError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Network(_) => FailureCategory::Network,
            Self::Timeout(_) => FailureCategory::Timeout,
            Self::NotModified | Self::Api { .. } | Self::Io(_) => FailureCategory::Other,
        }
    }
}

/// Abstract delivery transport.
///
/// Message text is HTML.
pub trait DeliveryTransport: Send + Sync {
    /// Sends a text message and returns a handle for later edits.
    fn send_message<'a>(
        &'a self,
        chat: ChatId,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, TransportError>> + Send + 'a>>;

    /// Replaces the text of a message.
    fn edit_message<'a>(
        &'a self,
        message: MessageRef,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    fn delete_message(
        &self,
        message: MessageRef,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>>;

    /// Uploads a file from disk.
    fn send_document<'a>(
        &'a self,
        upload: &'a DocumentUpload,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, TransportError>> + Send + 'a>>;
}
