//! Outbound leg of the relay pipeline.
//!
//! The delivery transport is abstracted behind [`DeliveryTransport`] so the
//! upload logic can be exercised with mocks. [`RelayUploader`] wraps one
//! document send with:
//!
//! - a size-proportional timeout budget ([`TimeoutBudget`])
//! - up to three attempts with linear backoff ([`RetryPolicy`])
//! - a per-attempt heartbeat that animates the status message

pub mod budget;
mod heartbeat;
pub mod retry;
pub mod status;
pub mod transport;
pub mod uploader;

pub use budget::TimeoutBudget;
pub use retry::RetryPolicy;
pub use transport::{
    ChatId, DeliveryTransport, DocumentUpload, FailureCategory, MessageRef, SendTimeouts,
    TransportError,
};
pub use uploader::{RelayUploader, UploadError, UploadReport, UploadRequest};
