//! Streaming download to local storage.
//!
//! The body is never held in memory as a whole: network frames are
//! coalesced into writes of `HttpSettings::chunk_size` bytes.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Url;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::FetchClient;
use crate::error::DownloadError;

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub path: PathBuf,
    /// Bytes actually written, regardless of what the server declared.
    pub bytes: u64,
}

/// Streams remote resources to disk.
pub struct Downloader<'a> {
    client: &'a FetchClient,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a FetchClient) -> Self {
        Self { client }
    }

    /// Downloads `url` into `destination`, creating parent directories.
    ///
    /// `on_progress(bytes_so_far, declared_total_or_zero)` is called after
    /// every write. A partially written file is left in place on error; the
    /// caller owns its removal.
    pub async fn download<F>(
        &self,
        url: &Url,
        destination: &Path,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<Downloaded, DownloadError>
    where
        F: FnMut(u64, u64),
    {
        let settings = self.client.settings();
        let _permit = self.client.acquire(url).await;

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            r = self.client.http().get(url.clone()).send() => r?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus(status.as_u16()));
        }

        let declared = response.content_length().unwrap_or(0);
        debug!(url = %url, declared, "download started");

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::with_capacity(settings.chunk_size);
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = tokio::time::timeout(settings.idle_read_timeout, stream.next()) => next,
            };

            match next {
                Err(_) => return Err(DownloadError::Stalled(settings.idle_read_timeout)),
                Ok(None) => break,
                Ok(Some(frame)) => {
                    buffer.extend_from_slice(&frame?);
                    if buffer.len() >= settings.chunk_size {
                        file.write_all(&buffer).await?;
                        written += buffer.len() as u64;
                        buffer.clear();
                        on_progress(written, declared);
                    }
                }
            }
        }

        if !buffer.is_empty() {
            file.write_all(&buffer).await?;
            written += buffer.len() as u64;
            on_progress(written, declared);
        }
        file.flush().await?;

        info!(url = %url, bytes = written, path = %destination.display(), "download complete");

        Ok(Downloaded {
            path: destination.to_path_buf(),
            bytes: written,
        })
    }
}
