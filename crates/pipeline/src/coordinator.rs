//! The transfer state machine.
//!
//! A requester moves through `submit_link` → `choose_name` → `run_transfer`.
//! The first two only touch the [`SessionStore`]; `run_transfer` owns the
//! artifact and guarantees that it and the session are gone when it returns,
//! whichever way the transfer ended.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use linkrelay_fetch::{Downloader, FetchClient, probe_metadata, validate_link};
use linkrelay_relay::{
    ChatId, DeliveryTransport, MessageRef, RelayUploader, TransportError, UploadRequest, status,
};
use linkrelay_transfer::{
    DownloadArtifact, FALLBACK_NAME, ProgressSample, RateMeter, ThrottleState,
    validate_display_name,
};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::PipelineError;
use crate::report;
use crate::session::{RequesterId, SessionStore, TransferSession};
use crate::state::TransferState;
use crate::types::{NameChoice, PipelineSettings, TransferEvent, TransferOutcome};

/// Window over which the download rate is averaged.
const RATE_WINDOW: Duration = Duration::from_secs(10);

/// Drives transfers for many requesters concurrently.
pub struct TransferCoordinator {
    transport: Arc<dyn DeliveryTransport>,
    fetch: Arc<FetchClient>,
    sessions: Arc<SessionStore>,
    active: Arc<DashMap<RequesterId, CancellationToken>>,
    settings: PipelineSettings,
    events_tx: mpsc::Sender<TransferEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<TransferEvent>>>,
}

impl TransferCoordinator {
    pub fn new(
        transport: Arc<dyn DeliveryTransport>,
        fetch: Arc<FetchClient>,
        settings: PipelineSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            transport,
            fetch,
            sessions: Arc::new(SessionStore::new()),
            active: Arc::new(DashMap::new()),
            settings,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.lock().await.take()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Whether `requester` has a download or upload running.
    pub fn is_transferring(&self, requester: RequesterId) -> bool {
        self.active.contains_key(&requester)
    }

    /// Validates and probes a link, then stores a fresh session for it.
    ///
    /// A rejected link leaves any existing session untouched. An accepted one
    /// replaces it.
    pub async fn submit_link(
        &self,
        requester: RequesterId,
        raw: &str,
    ) -> Result<TransferSession, PipelineError> {
        if self.is_transferring(requester) {
            return Err(PipelineError::TransferInProgress);
        }

        let url = match validate_link(&self.fetch, raw).await {
            Ok(url) => url,
            Err(e) => {
                info!(requester = %requester, kind = ?e.kind(), reason = %e, "link rejected");
                self.publish(requester, TransferState::AwaitingLink);
                return Err(e.into());
            }
        };
        self.publish(requester, TransferState::LinkSubmitted);

        let metadata = probe_metadata(&self.fetch, &url).await;
        let suggested = metadata
            .filename
            .unwrap_or_else(|| FALLBACK_NAME.to_string());
        let session = TransferSession::new(requester, url, suggested, metadata.size);
        self.sessions.put(session.clone());

        info!(
            requester = %requester,
            name = %session.suggested_name,
            size = ?session.declared_size,
            "link accepted"
        );
        self.publish(requester, TransferState::AwaitingNameChoice);
        Ok(session)
    }

    /// Fixes the file name of the requester's pending session.
    pub fn choose_name(
        &self,
        requester: RequesterId,
        choice: NameChoice,
    ) -> Result<TransferSession, PipelineError> {
        let session = self
            .sessions
            .get(requester)
            .ok_or(PipelineError::SessionExpired)?;

        let name = match choice {
            NameChoice::Suggested => session.suggested_name,
            NameChoice::Override(raw) => validate_display_name(&raw)?.to_string(),
        };
        debug!(requester = %requester, name = %name, "file name chosen");
        self.sessions.set_chosen_name(requester, name)
    }

    /// Requests cancellation.
    ///
    /// A running transfer stops at its next suspension point and still cleans
    /// up. Otherwise the pending session, if any, is discarded. Returns whether
    /// there was anything to cancel.
    pub fn cancel(&self, requester: RequesterId) -> bool {
        if let Some(token) = self.active.get(&requester) {
            info!(requester = %requester, "cancelling running transfer");
            token.cancel();
            return true;
        }

        let removed = self.sessions.delete(requester);
        if removed {
            info!(requester = %requester, "pending session discarded");
            self.publish(requester, TransferState::Cancelled);
        }
        removed
    }

    /// Cancels every running transfer.
    pub fn cancel_all(&self) {
        for entry in self.active.iter() {
            entry.value().cancel();
        }
    }

    /// Downloads, checks and uploads the requester's named session.
    ///
    /// Progress is rendered into `status` when given (it is reset to the
    /// starting text), otherwise into a freshly sent message.
    ///
    /// Fails without side effects when there is no session, the name is not
    /// chosen yet, or a transfer is already running. Once the transfer
    /// starts, the outcome is always terminal and the artifact and session
    /// have been removed.
    pub async fn run_transfer(
        &self,
        requester: RequesterId,
        chat: ChatId,
        status: Option<MessageRef>,
    ) -> Result<TransferOutcome, PipelineError> {
        let session = self
            .sessions
            .get(requester)
            .ok_or(PipelineError::SessionExpired)?;
        let name = session
            .chosen_name()
            .ok_or(PipelineError::NameNotChosen)?
            .to_string();

        let cancel = match self.active.entry(requester) {
            Entry::Occupied(_) => return Err(PipelineError::TransferInProgress),
            Entry::Vacant(slot) => slot.insert(CancellationToken::new()).value().clone(),
        };

        let artifact =
            DownloadArtifact::stage(&self.settings.download_dir, &requester.to_string(), &name);
        let guard = CleanupGuard {
            requester,
            artifact: artifact.clone(),
            sessions: Arc::clone(&self.sessions),
            active: Arc::clone(&self.active),
            done: false,
        };

        let status = self.status_message(chat, status).await;

        let mut size = None;
        let result = self
            .drive(&session, &name, &artifact, chat, status, &cancel, &mut size)
            .await;

        guard.finish();

        let outcome = match result {
            Ok(()) => {
                info!(requester = %requester, name = %name, size = ?size, "transfer done");
                self.publish(requester, TransferState::Done);
                self.emit(TransferEvent::Completed {
                    requester,
                    size: size.unwrap_or_default(),
                });
                if let Some(message) = status
                    && let Err(e) = self.transport.delete_message(message).await
                {
                    debug!(error = %e, "status message not deleted");
                }
                TransferOutcome {
                    requester,
                    state: TransferState::Done,
                    size,
                    error: None,
                }
            }
            Err(e) => {
                let state = if e.is_cancellation() {
                    info!(requester = %requester, "transfer cancelled");
                    TransferState::Cancelled
                } else {
                    error!(requester = %requester, error = %e, "transfer failed");
                    TransferState::Failed
                };
                self.publish(requester, state);
                self.emit(TransferEvent::Failed {
                    requester,
                    error: e.to_string(),
                });
                self.show_failure(chat, status, &e, size).await;
                TransferOutcome {
                    requester,
                    state,
                    size,
                    error: Some(e),
                }
            }
        };
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        session: &TransferSession,
        name: &str,
        artifact: &DownloadArtifact,
        chat: ChatId,
        status: Option<MessageRef>,
        cancel: &CancellationToken,
        measured: &mut Option<u64>,
    ) -> Result<(), PipelineError> {
        let requester = session.requester;

        self.publish(requester, TransferState::Downloading);
        self.download(session, artifact, status, cancel).await?;

        self.publish(requester, TransferState::SizeCheck);
        let size = artifact.size_on_disk().await?;
        *measured = Some(size);
        if size > self.settings.max_upload_size {
            warn!(
                requester = %requester,
                size,
                limit = self.settings.max_upload_size,
                "artifact exceeds upload limit"
            );
            return Err(PipelineError::SizeExceeded {
                size,
                limit: self.settings.max_upload_size,
            });
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        self.publish(requester, TransferState::Uploading);
        if let Some(message) = status {
            self.edit_quietly(message, &status::upload_started(size)).await;
        }

        let uploader = RelayUploader::new(Arc::clone(&self.transport))
            .with_retry(self.settings.retry)
            .with_budget(self.settings.budget)
            .with_heartbeat_interval(self.settings.heartbeat_interval);
        let request = UploadRequest {
            artifact: artifact.path(),
            size,
            chat,
            file_name: name,
            status,
        };
        let delivered = uploader.upload(&request, cancel).await?;
        debug!(
            requester = %requester,
            attempts = delivered.attempts,
            elapsed_secs = delivered.elapsed.as_secs(),
            "document delivered"
        );
        Ok(())
    }

    /// Streams the source to the artifact path while a separate task renders
    /// throttled progress, so slow status edits never stall the stream.
    async fn download(
        &self,
        session: &TransferSession,
        artifact: &DownloadArtifact,
        status: Option<MessageRef>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let (tx, rx) = watch::channel(None);
        let pusher = status.map(|message| {
            spawn_status_pusher(
                Arc::clone(&self.transport),
                message,
                rx,
                self.settings.bar_width,
            )
        });

        let policy = &self.settings.throttle;
        let mut throttle = ThrottleState::starting_at(Instant::now());
        let result = Downloader::new(&self.fetch)
            .download(
                &session.source_url,
                artifact.path(),
                cancel,
                |bytes, total| {
                    let sample = ProgressSample::new(bytes, Some(total), Instant::now());
                    let (emit, next) = policy.decide(throttle, &sample);
                    throttle = next;
                    if emit {
                        tx.send_replace(Some(sample));
                    }
                },
            )
            .await;

        drop(tx);
        if let Some(pusher) = pusher {
            let _ = pusher.await;
        }

        let downloaded = result?;
        info!(
            requester = %session.requester,
            bytes = downloaded.bytes,
            path = %downloaded.path.display(),
            "download complete"
        );
        Ok(())
    }

    async fn status_message(
        &self,
        chat: ChatId,
        existing: Option<MessageRef>,
    ) -> Option<MessageRef> {
        let text = report::starting_download();
        let result = match existing {
            Some(message) => match self.transport.edit_message(message, &text).await {
                Ok(()) | Err(TransportError::NotModified) => Ok(message),
                Err(e) => Err(e),
            },
            None => self.transport.send_message(chat, &text).await,
        };
        result
            .inspect_err(|e| warn!(chat = %chat, error = %e, "could not post status message"))
            .ok()
    }

    async fn show_failure(
        &self,
        chat: ChatId,
        status: Option<MessageRef>,
        error: &PipelineError,
        size: Option<u64>,
    ) {
        let text = report::failure(error, size);
        let shown = match status {
            Some(message) => self.transport.edit_message(message, &text).await,
            None => self.transport.send_message(chat, &text).await.map(|_| ()),
        };
        if let Err(e) = shown {
            warn!(chat = %chat, error = %e, "could not show failure report");
        }
    }

    async fn edit_quietly(&self, message: MessageRef, text: &str) {
        if let Err(e) = self.transport.edit_message(message, text).await {
            debug!(error = %e, "status update skipped");
        }
    }

    fn publish(&self, requester: RequesterId, state: TransferState) {
        info!(requester = %requester, state = %state, "state changed");
        self.emit(TransferEvent::StateChanged { requester, state });
    }

    fn emit(&self, event: TransferEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            trace!(error = %e, "transfer event dropped");
        }
    }
}

fn spawn_status_pusher(
    transport: Arc<dyn DeliveryTransport>,
    message: MessageRef,
    mut samples: watch::Receiver<Option<ProgressSample>>,
    bar_width: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut meter = RateMeter::new(RATE_WINDOW);
        while samples.changed().await.is_ok() {
            let Some(sample) = *samples.borrow_and_update() else {
                continue;
            };
            meter.record(sample.at, sample.bytes);
            let eta = sample
                .total
                .and_then(|total| meter.eta(total.saturating_sub(sample.bytes)));
            let text = report::downloading(
                sample.bytes,
                sample.total,
                sample.percent(),
                meter.bytes_per_second(),
                eta,
                bar_width,
            );
            match transport.edit_message(message, &text).await {
                Ok(()) => {}
                Err(TransportError::NotModified) => trace!("progress unchanged"),
                Err(e) => debug!(error = %e, "progress update skipped"),
            }
        }
    })
}

/// Removes the artifact, then the session, exactly once.
///
/// `finish` runs the cleanup on the normal path. If the transfer future is
/// dropped or unwinds first, `Drop` does it instead.
struct CleanupGuard {
    requester: RequesterId,
    artifact: DownloadArtifact,
    sessions: Arc<SessionStore>,
    active: Arc<DashMap<RequesterId, CancellationToken>>,
    done: bool,
}

impl CleanupGuard {
    fn finish(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if self.done {
            return;
        }
        self.done = true;

        if let Err(e) = self.artifact.remove() {
            error!(
                requester = %self.requester,
                path = %self.artifact.path().display(),
                error = %e,
                "artifact left on disk"
            );
        }
        self.sessions.delete(self.requester);
        self.active.remove(&self.requester);
        debug!(requester = %self.requester, "transfer cleaned up");
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.done {
            warn!(requester = %self.requester, "transfer interrupted, cleaning up");
            self.cleanup();
        }
    }
}
