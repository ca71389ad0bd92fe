//! Inbound leg of the relay pipeline.
//!
//! Everything that talks to the remote resource lives here:
//!
//! 1. **Validate**: reject malformed links and HTML landing pages
//! 2. **Probe**: discover a filename and declared size from headers
//! 3. **Download**: stream the body to disk in bounded writes
//!
//! All three share one [`FetchClient`], which owns the connection policy
//! (connect and idle-read timeouts, connection ceilings, DNS caching).

pub mod client;
pub mod download;
pub mod error;
pub mod probe;
pub mod validate;

#[cfg(test)]
mod test_server;

pub use client::{FetchClient, HttpSettings};
pub use download::{Downloaded, Downloader};
pub use error::{DownloadError, LinkError, RejectionKind};
pub use probe::{ResourceMetadata, probe_metadata, resolve_filename};
pub use reqwest::Url;
pub use validate::{classify_head, parse_link, validate_link};
