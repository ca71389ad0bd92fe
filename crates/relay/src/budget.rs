use std::time::Duration;

use crate::transport::SendTimeouts;

/// Size-proportional timeouts for a single upload attempt.
///
/// Read and write each get `size / floor_throughput + buffer`, capped at
/// `cap`. The connect timeout is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutBudget {
    /// Conservative throughput assumption in bytes per second.
    pub floor_throughput: u64,
    pub buffer: Duration,
    pub cap: Duration,
    pub connect: Duration,
}

impl Default for TimeoutBudget {
    fn default() -> Self {
        Self {
            floor_throughput: 100 * 1024,
            buffer: Duration::from_secs(600),
            cap: Duration::from_secs(7200),
            connect: Duration::from_secs(60),
        }
    }
}

impl TimeoutBudget {
    pub fn for_size(&self, size: u64) -> SendTimeouts {
        let transfer = Duration::from_secs(size / self.floor_throughput.max(1));
        let io = transfer.saturating_add(self.buffer).min(self.cap);
        SendTimeouts {
            read: io,
            write: io,
            connect: self.connect,
        }
    }
}
