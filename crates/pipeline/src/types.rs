//! Data types for the transfer flow.

use std::path::PathBuf;
use std::time::Duration;

use linkrelay_relay::{RetryPolicy, TimeoutBudget};
use linkrelay_transfer::{DEFAULT_BAR_WIDTH, ThrottlePolicy};

use crate::error::PipelineError;
use crate::session::RequesterId;
use crate::state::TransferState;

/// Hard ceiling of the delivery transport: 2 GiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Tunables for [`TransferCoordinator`](crate::TransferCoordinator).
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root under which artifacts are staged.
    pub download_dir: PathBuf,
    /// Artifacts larger than this are never uploaded.
    pub max_upload_size: u64,
    pub throttle: ThrottlePolicy,
    pub retry: RetryPolicy,
    pub budget: TimeoutBudget,
    pub bar_width: usize,
    pub heartbeat_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            throttle: ThrottlePolicy::default(),
            retry: RetryPolicy::default(),
            budget: TimeoutBudget::default(),
            bar_width: DEFAULT_BAR_WIDTH,
            heartbeat_interval: Duration::from_secs(2),
        }
    }
}

/// How the requester settled the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameChoice {
    Suggested,
    Override(String),
}

/// Event emitted while a transfer progresses.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    StateChanged {
        requester: RequesterId,
        state: TransferState,
    },
    Completed {
        requester: RequesterId,
        size: u64,
    },
    Failed {
        requester: RequesterId,
        error: String,
    },
}

/// How a transfer ended.
#[derive(Debug)]
pub struct TransferOutcome {
    pub requester: RequesterId,
    /// `Done`, `Failed` or `Cancelled`.
    pub state: TransferState,
    /// Measured artifact size, when the download got that far.
    pub size: Option<u64>,
    pub error: Option<PipelineError>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.state == TransferState::Done
    }
}
