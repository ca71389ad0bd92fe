//! Upload with retry, backoff and a per-attempt heartbeat.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::budget::TimeoutBudget;
use crate::heartbeat::Heartbeat;
use crate::retry::RetryPolicy;
use crate::status;
use crate::transport::{
    ChatId, DeliveryTransport, DocumentUpload, FailureCategory, MessageRef, TransportError,
};

/// Default heartbeat refresh interval.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// What to upload and where to report.
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub artifact: &'a Path,
    /// Measured size on disk.
    pub size: u64,
    pub chat: ChatId,
    pub file_name: &'a str,
    /// Status message animated during attempts, if any.
    pub status: Option<MessageRef>,
}

/// A successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub delivered: MessageRef,
    pub attempts: u32,
    /// Duration of the successful attempt.
    pub elapsed: Duration,
}

/// Errors from [`RelayUploader::upload`].
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Every attempt failed; carries the last attempt's error.
    #[error("upload failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: TransportError,
    },

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Category of the final failure; `None` for cancellation.
    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            Self::Exhausted { last, .. } => Some(last.category()),
            Self::Cancelled => None,
        }
    }
}

/// Sends an artifact through a [`DeliveryTransport`].
///
/// Each attempt gets its own heartbeat, started before the send and joined
/// before the outcome is inspected, so a failed attempt's animation can
/// never overwrite the retry notice or the next attempt's frames.
pub struct RelayUploader {
    transport: Arc<dyn DeliveryTransport>,
    retry: RetryPolicy,
    budget: TimeoutBudget,
    heartbeat_interval: Duration,
}

impl RelayUploader {
    pub fn new(transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            budget: TimeoutBudget::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_budget(mut self, budget: TimeoutBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Uploads the artifact, retrying every failure category alike.
    ///
    /// Cancellation aborts an in-flight attempt or a backoff wait immediately.
    pub async fn upload(
        &self,
        request: &UploadRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, UploadError> {
        let max_attempts = self.retry.attempts();
        let document = DocumentUpload {
            chat: request.chat,
            path: request.artifact.to_path_buf(),
            file_name: request.file_name.to_string(),
            caption: status::delivered_caption(request.size),
            size: request.size,
            timeouts: self.budget.for_size(request.size),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            info!(
                file = %request.file_name,
                size = request.size,
                attempt,
                max_attempts,
                "upload attempt"
            );

            let started = Instant::now();
            let heartbeat = request.status.map(|message| {
                Heartbeat::start(
                    Arc::clone(&self.transport),
                    message,
                    request.size,
                    self.heartbeat_interval,
                    cancel,
                )
            });

            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                result = self.transport.send_document(&document) => Some(result),
            };

            if let Some(heartbeat) = heartbeat {
                heartbeat.stop().await;
            }

            let error = match outcome {
                None => return Err(UploadError::Cancelled),
                Some(Ok(delivered)) => {
                    let elapsed = started.elapsed();
                    info!(
                        file = %request.file_name,
                        attempt,
                        elapsed_secs = elapsed.as_secs(),
                        "upload complete"
                    );
                    return Ok(UploadReport {
                        delivered,
                        attempts: attempt,
                        elapsed,
                    });
                }
                Some(Err(e)) => e,
            };

            if attempt >= max_attempts {
                error!(
                    file = %request.file_name,
                    attempts = attempt,
                    error = %error,
                    "upload failed"
                );
                return Err(UploadError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let wait = self.retry.delay_after(attempt);
            warn!(
                attempt,
                error = %error,
                wait_secs = wait.as_secs(),
                "upload attempt failed, retrying"
            );

            if let Some(message) = request.status {
                let text =
                    status::upload_retrying(error.category(), attempt + 1, max_attempts, wait);
                if let Err(e) = self.transport.edit_message(message, &text).await {
                    warn!(error = %e, "failed to show retry notice");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::path::PathBuf;
    use std::pin::Pin;
    use std::sync::Mutex;

    /// Scripted transport: `send_document` pops results from the front.
    struct MockTransport {
        results: Mutex<Vec<Result<MessageRef, TransportError>>>,
        send_delay: Duration,
        uploads: Mutex<Vec<DocumentUpload>>,
        edits: Mutex<Vec<(Instant, String)>>,
    }

    impl MockTransport {
        fn new(results: Vec<Result<MessageRef, TransportError>>) -> Self {
            Self {
                results: Mutex::new(results),
                send_delay: Duration::ZERO,
                uploads: Mutex::new(Vec::new()),
                edits: Mutex::new(Vec::new()),
            }
        }

        fn with_send_delay(mut self, delay: Duration) -> Self {
            self.send_delay = delay;
            self
        }
    }

    impl DeliveryTransport for MockTransport {
        fn send_message<'a>(
            &'a self,
            chat: ChatId,
            _text: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<MessageRef, TransportError>> + Send + 'a>> {
            Box::pin(async move {
                Ok(MessageRef {
                    chat,
                    message_id: 100,
                })
            })
        }

        fn edit_message<'a>(
            &'a self,
            _message: MessageRef,
            text: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
            Box::pin(async move {
                self.edits
                    .lock()
                    .unwrap()
                    .push((Instant::now(), text.to_string()));
                Ok(())
            })
        }

        fn delete_message(
            &self,
            _message: MessageRef,
        ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }

        fn send_document<'a>(
            &'a self,
            upload: &'a DocumentUpload,
        ) -> Pin<Box<dyn Future<Output = Result<MessageRef, TransportError>> + Send + 'a>> {
            Box::pin(async move {
                self.uploads.lock().unwrap().push(upload.clone());
                tokio::time::sleep(self.send_delay).await;
                let mut results = self.results.lock().unwrap();
                if results.is_empty() {
                    Err(TransportError::Network("script exhausted".into()))
                } else {
                    results.remove(0)
                }
            })
        }
    }

    fn delivered() -> MessageRef {
        MessageRef {
            chat: ChatId(5),
            message_id: 77,
        }
    }

    fn status_message() -> MessageRef {
        MessageRef {
            chat: ChatId(5),
            message_id: 1,
        }
    }

    fn request<'a>(path: &'a Path, status: Option<MessageRef>) -> UploadRequest<'a> {
        UploadRequest {
            artifact: path,
            size: 5 * 1024 * 1024,
            chat: ChatId(5),
            file_name: "movie.mkv",
            status,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_succeeds() {
        let mock = Arc::new(MockTransport::new(vec![Ok(delivered())]));
        let uploader = RelayUploader::new(mock.clone());
        let path = PathBuf::from("/tmp/movie.mkv");

        let report = uploader
            .upload(&request(&path, None), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.delivered, delivered());
        assert_eq!(report.attempts, 1);

        let uploads = mock.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].file_name, "movie.mkv");
        assert_eq!(uploads[0].timeouts, TimeoutBudget::default().for_size(5 * 1024 * 1024));
        assert!(uploads[0].caption.contains("5.00 MB"));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let mock = Arc::new(MockTransport::new(vec![
            Err(TransportError::Timeout("write".into())),
            Ok(delivered()),
        ]));
        let uploader = RelayUploader::new(mock.clone());
        let path = PathBuf::from("/tmp/movie.mkv");

        let start = Instant::now();
        let report = uploader
            .upload(&request(&path, None), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_waits_thirty_seconds_and_surfaces_last_error() {
        let mock = Arc::new(MockTransport::new(vec![
            Err(TransportError::Network("first".into())),
            Err(TransportError::Timeout("second".into())),
            Err(TransportError::Api {
                code: 500,
                description: "third".into(),
            }),
        ]));
        let uploader = RelayUploader::new(mock.clone());
        let path = PathBuf::from("/tmp/movie.mkv");

        let start = Instant::now();
        let err = uploader
            .upload(&request(&path, None), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert_eq!(mock.uploads.lock().unwrap().len(), 3);
        match err {
            UploadError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, TransportError::Api { description, .. } if description == "third"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_notice_names_next_attempt() {
        let mock = Arc::new(MockTransport::new(vec![
            Err(TransportError::Network("reset".into())),
            Ok(delivered()),
        ]));
        let uploader = RelayUploader::new(mock.clone());
        let path = PathBuf::from("/tmp/movie.mkv");

        uploader
            .upload(&request(&path, Some(status_message())), &CancellationToken::new())
            .await
            .unwrap();

        let edits = mock.edits.lock().unwrap();
        let notice = edits
            .iter()
            .find(|(_, text)| text.contains("Upload Interrupted"))
            .expect("retry notice shown");
        assert!(notice.1.contains("Attempt 2/3"));
        assert!(notice.1.contains("Waiting 10 seconds"));
        assert!(notice.1.contains("NetworkError"));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_is_scoped_to_each_attempt() {
        let mock = Arc::new(
            MockTransport::new(vec![
                Err(TransportError::Network("reset".into())),
                Ok(delivered()),
            ])
            .with_send_delay(Duration::from_secs(5)),
        );
        let uploader = RelayUploader::new(mock.clone());
        let path = PathBuf::from("/tmp/movie.mkv");

        let start = Instant::now();
        uploader
            .upload(&request(&path, Some(status_message())), &CancellationToken::new())
            .await
            .unwrap();
        let finished = Instant::now();

        // Attempt 1: 0–5 s, backoff: 5–15 s, attempt 2: 15–20 s.
        assert_eq!(finished - start, Duration::from_secs(20));

        let edits = mock.edits.lock().unwrap().clone();
        let during_backoff = edits.iter().filter(|(at, text)| {
            let t = *at - start;
            t > Duration::from_secs(5) && t < Duration::from_secs(15) && text.contains("In Progress")
        });
        assert_eq!(during_backoff.count(), 0, "no heartbeat between attempts");

        let heartbeats = edits.iter().filter(|(_, t)| t.contains("In Progress")).count();
        // Frames at 0, 2, 4 s of each attempt.
        assert_eq!(heartbeats, 6);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.edits.lock().unwrap().len(), edits.len(), "nothing renders after return");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff() {
        let mock = Arc::new(MockTransport::new(vec![Err(TransportError::Network(
            "reset".into(),
        ))]));
        let uploader = RelayUploader::new(mock.clone());
        let path = PathBuf::from("/tmp/movie.mkv");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = uploader
            .upload(&request(&path, None), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(mock.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_attempt() {
        let mock = Arc::new(
            MockTransport::new(vec![Ok(delivered())]).with_send_delay(Duration::from_secs(60)),
        );
        let uploader = RelayUploader::new(mock.clone());
        let path = PathBuf::from("/tmp/movie.mkv");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = uploader
            .upload(&request(&path, Some(status_message())), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(err.category(), None);
    }

    #[test]
    fn exhausted_category_follows_last_error() {
        let err = UploadError::Exhausted {
            attempts: 3,
            last: TransportError::Timeout("read".into()),
        };
        assert_eq!(err.category(), Some(FailureCategory::Timeout));
    }
}
