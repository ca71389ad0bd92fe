//! Pipeline error types.

use linkrelay_fetch::{DownloadError, LinkError};
use linkrelay_relay::UploadError;
use linkrelay_transfer::NameError;

/// Errors produced while coordinating a transfer.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Link rejected: invalid, unreachable, or not a direct link.
    #[error("link rejected: {0}")]
    Link(#[from] LinkError),

    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("file is {size} bytes, limit is {limit} bytes")]
    SizeExceeded { size: u64, limit: u64 },

    #[error("{0}")]
    Upload(#[from] UploadError),

    #[error("session expired")]
    SessionExpired,

    #[error("file name already chosen")]
    NameAlreadyChosen,

    #[error("no file name chosen yet")]
    NameNotChosen,

    #[error("invalid file name: {0}")]
    InvalidName(#[from] NameError),

    #[error("a transfer is already running for this requester")]
    TransferInProgress,

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether the error came from a cancellation request, whichever leg observed it.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Download(DownloadError::Cancelled)
                | Self::Upload(UploadError::Cancelled)
        )
    }
}
