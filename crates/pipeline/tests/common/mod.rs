//! Shared fixtures: a scripted HTTP origin and a recording transport.

#![allow(dead_code)]

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use linkrelay_fetch::{FetchClient, HttpSettings};
use linkrelay_pipeline::{PipelineSettings, TransferCoordinator};
use linkrelay_relay::{ChatId, DeliveryTransport, DocumentUpload, MessageRef, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// One canned answer to one connection.
pub enum Reply {
    Respond { head: String, body: Vec<u8> },
    /// Close the connection without answering.
    Hangup,
    /// Send the head and a body prefix, then hold the connection open.
    Stall { head: String, body: Vec<u8> },
}

impl Reply {
    pub fn new(status: &str, headers: &[(&str, String)], body: &[u8]) -> Self {
        Reply::Respond {
            head: response_head(status, headers),
            body: body.to_vec(),
        }
    }

    /// HEAD answer for a downloadable file of `len` bytes.
    pub fn head_ok(len: usize) -> Self {
        Self::new(
            "200 OK",
            &[
                ("Content-Type", "application/octet-stream".to_string()),
                ("Content-Length", len.to_string()),
            ],
            b"",
        )
    }

    /// GET answer carrying `body`.
    pub fn file(body: &[u8]) -> Self {
        Self::new(
            "200 OK",
            &[
                ("Content-Type", "application/octet-stream".to_string()),
                ("Content-Length", body.len().to_string()),
            ],
            body,
        )
    }

    /// GET answer that declares `len` bytes but stops after `prefix`.
    pub fn stalled_file(len: usize, prefix: &[u8]) -> Self {
        Reply::Stall {
            head: response_head(
                "200 OK",
                &[
                    ("Content-Type", "application/octet-stream".to_string()),
                    ("Content-Length", len.to_string()),
                ],
            ),
            body: prefix.to_vec(),
        }
    }

    pub fn status(status: &str) -> Self {
        Self::new(status, &[("Content-Length", "0".to_string())], b"")
    }
}

fn response_head(status: &str, headers: &[(&str, String)]) -> String {
    let mut head = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("Connection: close\r\n\r\n");
    head
}

/// Answers one connection per reply, in order. Returns the base URL.
pub async fn serve(replies: Vec<Reply>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        for reply in replies {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 8192];
            let _ = stream.read(&mut buf).await;

            match reply {
                Reply::Respond { head, body } => {
                    let _ = stream.write_all(head.as_bytes()).await;
                    let is_head = buf.starts_with(b"HEAD ");
                    if !is_head {
                        let _ = stream.write_all(&body).await;
                    }
                    let _ = stream.shutdown().await;
                }
                Reply::Hangup => drop(stream),
                Reply::Stall { head, body } => {
                    let _ = stream.write_all(head.as_bytes()).await;
                    let _ = stream.write_all(&body).await;
                    let _ = stream.flush().await;
                    std::future::pending::<()>().await;
                }
            }
        }
    });

    format!("http://127.0.0.1:{port}")
}

/// What the transport saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send(String),
    Edit(String),
    Delete,
    Document {
        file_name: String,
        path: PathBuf,
        contents: Vec<u8>,
    },
}

/// How `send_document` behaves.
pub enum UploadScript {
    /// Pop results from the front; succeed once empty.
    Results(Vec<TransportError>),
    /// Never finish; signal `started` when called.
    Hang,
}

pub struct RecordingTransport {
    pub calls: Mutex<Vec<Call>>,
    script: Mutex<UploadScript>,
    pub upload_started: Notify,
    next_id: Mutex<i64>,
}

impl RecordingTransport {
    pub fn new(script: UploadScript) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script),
            upload_started: Notify::new(),
            next_id: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn documents(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Document { .. }))
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::Send(t) | Call::Edit(t) => Some(t),
            _ => None,
        })
    }
}

impl DeliveryTransport for RecordingTransport {
    fn send_message<'a>(
        &'a self,
        chat: ChatId,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(Call::Send(text.to_string()));
            let mut id = self.next_id.lock().unwrap();
            *id += 1;
            Ok(MessageRef {
                chat,
                message_id: *id,
            })
        })
    }

    fn edit_message<'a>(
        &'a self,
        _message: MessageRef,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(Call::Edit(text.to_string()));
            Ok(())
        })
    }

    fn delete_message(
        &self,
        _message: MessageRef,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(Call::Delete);
            Ok(())
        })
    }

    fn send_document<'a>(
        &'a self,
        upload: &'a DocumentUpload,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let contents = tokio::fs::read(&upload.path).await.unwrap_or_default();
            self.calls.lock().unwrap().push(Call::Document {
                file_name: upload.file_name.clone(),
                path: upload.path.clone(),
                contents,
            });

            let next = match &mut *self.script.lock().unwrap() {
                UploadScript::Results(results) if results.is_empty() => Some(Ok(())),
                UploadScript::Results(results) => Some(Err(results.remove(0))),
                UploadScript::Hang => None,
            };
            match next {
                Some(Ok(())) => Ok(MessageRef {
                    chat: upload.chat,
                    message_id: 999,
                }),
                Some(Err(e)) => Err(e),
                None => {
                    self.upload_started.notify_one();
                    std::future::pending().await
                }
            }
        })
    }
}

pub fn coordinator(
    transport: Arc<RecordingTransport>,
    download_dir: PathBuf,
    tweak: impl FnOnce(&mut PipelineSettings),
) -> TransferCoordinator {
    let mut settings = PipelineSettings {
        download_dir,
        ..PipelineSettings::default()
    };
    tweak(&mut settings);
    let fetch = FetchClient::new(HttpSettings::default()).unwrap();
    TransferCoordinator::new(transport, Arc::new(fetch), settings)
}

/// Waits until some file appears under `dir`.
pub async fn wait_for_file_under(dir: &std::path::Path) {
    tokio::time::timeout(std::time::Duration::from_secs(10), async {
        while no_files_under(dir) {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no file was created");
}

/// True when nothing but empty directories remains under `dir`.
pub fn no_files_under(dir: &std::path::Path) -> bool {
    fn walk(dir: &std::path::Path) -> bool {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return true;
        };
        entries.flatten().all(|e| {
            let path = e.path();
            path.is_dir() && walk(&path)
        })
    }
    walk(dir)
}
