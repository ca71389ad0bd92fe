//! Minimal HTTP server for client tests.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One canned reply: raw head (status line + headers) and body bytes.
pub(crate) struct Reply {
    pub head: String,
    pub body: Vec<u8>,
    /// Pause for the given duration after that many body bytes.
    pub stall: Option<(usize, Duration)>,
}

impl Reply {
    pub(crate) fn new(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Self {
        let mut head = format!("HTTP/1.1 {status}\r\n");
        for (name, value) in headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("Connection: close\r\n\r\n");
        Self {
            head,
            body: body.to_vec(),
            stall: None,
        }
    }

    pub(crate) fn stalling_after(mut self, prefix: usize, pause: Duration) -> Self {
        self.stall = Some((prefix, pause));
        self
    }
}

/// Starts a server answering one connection per reply, in order.
/// Returns the base URL.
pub(crate) async fn serve(replies: Vec<Reply>) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = format!("http://127.0.0.1:{port}");

    let handle = tokio::spawn(async move {
        for reply in replies {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 8192];
            let _ = stream.read(&mut buf).await;

            let _ = stream.write_all(reply.head.as_bytes()).await;
            match reply.stall {
                Some((prefix, pause)) => {
                    let prefix = prefix.min(reply.body.len());
                    let _ = stream.write_all(&reply.body[..prefix]).await;
                    let _ = stream.flush().await;
                    tokio::time::sleep(pause).await;
                    let _ = stream.write_all(&reply.body[prefix..]).await;
                }
                None => {
                    let _ = stream.write_all(&reply.body).await;
                }
            }
            let _ = stream.shutdown().await;
        }
    });

    (url, handle)
}

/// Returns a URL on a port nothing listens on.
pub(crate) async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
