//! Per-attempt status animation.
//!
//! A heartbeat lives exactly as long as one upload attempt. It is scoped to
//! a child [`CancellationToken`], so stopping the attempt, cancelling the
//! whole transfer, or dropping the [`Heartbeat`] all end the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

use crate::status;
use crate::transport::{DeliveryTransport, MessageRef};

pub(crate) struct Heartbeat {
    guard: Option<DropGuard>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Starts rendering into `message` every `interval`, beginning now.
    pub(crate) fn start(
        transport: Arc<dyn DeliveryTransport>,
        message: MessageRef,
        size: u64,
        interval: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let token = parent.child_token();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick = 0usize;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let text = status::upload_heartbeat(size, started.elapsed(), tick);
                tick = tick.wrapping_add(1);

                tokio::select! {
                    _ = task_token.cancelled() => break,
                    result = transport.edit_message(message, &text) => {
                        if let Err(e) = result {
                            debug!(error = %e, "heartbeat update skipped");
                        }
                    }
                }
            }
            trace!("heartbeat stopped");
        });

        Self {
            guard: Some(token.drop_guard()),
            handle: Some(handle),
        }
    }

    /// Cancels the task and waits for it to finish.
    pub(crate) async fn stop(mut self) {
        drop(self.guard.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
