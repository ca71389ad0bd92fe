use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Default percentage granularity of bucket-triggered updates.
const DEFAULT_PERCENT_STEP: u8 = 2;

/// Default byte threshold when the total is unknown: 10 MiB.
const DEFAULT_BYTE_STEP: u64 = 10 * 1024 * 1024;

/// Default liveness floor.
const DEFAULT_LIVENESS_FLOOR: Duration = Duration::from_secs(5);

/// One observation of an active transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub bytes: u64,
    /// Declared total; `None` when unknown.
    pub total: Option<u64>,
    pub at: Instant,
}

impl ProgressSample {
    pub fn new(bytes: u64, total: Option<u64>, at: Instant) -> Self {
        Self {
            bytes,
            total: total.filter(|&t| t > 0),
            at,
        }
    }

    /// Whole percentage, clamped to 100 if the stream outgrows its declared size.
    pub fn percent(&self) -> Option<u8> {
        self.total.map(|total| {
            let pct = u128::from(self.bytes) * 100 / u128::from(total);
            pct.min(100) as u8
        })
    }
}

/// Watermarks of the last emitted update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleState {
    pub last_emitted_bucket: Option<u8>,
    pub last_emitted_bytes: u64,
    /// `None` until the first emission; an unset clock is always stale.
    pub last_emitted_at: Option<Instant>,
}

impl ThrottleState {
    /// State for a transfer whose initial status was shown at `at`.
    pub fn starting_at(at: Instant) -> Self {
        Self {
            last_emitted_at: Some(at),
            ..Self::default()
        }
    }
}

/// Decides when a progress update is due.
///
/// Any one of these triggers an emission:
/// - known total: the percentage reached a multiple of `percent_step` not yet emitted
/// - unknown total: more than `byte_step` bytes since the last emission
/// - `liveness_floor` elapsed since the last emission
#[derive(Debug, Clone)]
pub struct ThrottlePolicy {
    pub percent_step: u8,
    pub byte_step: u64,
    pub liveness_floor: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            percent_step: DEFAULT_PERCENT_STEP,
            byte_step: DEFAULT_BYTE_STEP,
            liveness_floor: DEFAULT_LIVENESS_FLOOR,
        }
    }
}

impl ThrottlePolicy {
    /// Returns whether to emit for `sample`, and the state to carry forward.
    ///
    /// On emission every watermark moves to the sample, so a liveness-triggered
    /// update never causes a duplicate bucket update on the next chunk.
    pub fn decide(&self, state: ThrottleState, sample: &ProgressSample) -> (bool, ThrottleState) {
        let step = self.percent_step.max(1);
        let bucket = sample.percent().map(|p| p / step * step);

        let bucket_due = bucket.is_some_and(|b| b >= step && Some(b) != state.last_emitted_bucket);
        let bytes_due = bucket.is_none()
            && sample.bytes.saturating_sub(state.last_emitted_bytes) > self.byte_step;
        let stale = state
            .last_emitted_at
            .is_none_or(|at| sample.at.saturating_duration_since(at) >= self.liveness_floor);

        if !(bucket_due || bytes_due || stale) {
            return (false, state);
        }

        let next = ThrottleState {
            last_emitted_bucket: bucket.or(state.last_emitted_bucket),
            last_emitted_bytes: sample.bytes,
            last_emitted_at: Some(sample.at),
        };
        (true, next)
    }
}

/// Transfer rate over a sliding time window.
///
/// Fed with cumulative byte counts, so missed samples do not skew the rate.
#[derive(Debug, Clone)]
pub struct RateMeter {
    window: Duration,
    samples: VecDeque<(Instant, u64)>,
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl RateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Records `total_bytes` transferred so far at `at`.
    pub fn record(&mut self, at: Instant, total_bytes: u64) {
        self.samples.push_back((at, total_bytes));
        // Keep at least two samples so a rate is always computable.
        while self.samples.len() > 2
            && self
                .samples
                .front()
                .is_some_and(|&(t, _)| at.saturating_duration_since(t) > self.window)
        {
            self.samples.pop_front();
        }
    }

    /// Average bytes per second across the window, if measurable.
    pub fn bytes_per_second(&self) -> Option<f64> {
        let &(t0, b0) = self.samples.front()?;
        let &(t1, b1) = self.samples.back()?;
        let elapsed = t1.saturating_duration_since(t0);
        if elapsed.is_zero() {
            return None;
        }
        Some(b1.saturating_sub(b0) as f64 / elapsed.as_secs_f64())
    }

    /// Estimated time to move `remaining` more bytes.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let rate = self.bytes_per_second().filter(|&r| r > 0.0)?;
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}
