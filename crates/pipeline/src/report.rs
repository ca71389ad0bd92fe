//! Requester-facing status and failure texts (HTML).

use std::time::Duration;

use linkrelay_fetch::{DownloadError, LinkError};
use linkrelay_relay::{FailureCategory, TransportError, UploadError};
use linkrelay_transfer::{
    format_elapsed, format_rate, format_size, format_size_or_unknown, percent_label, progress_bar,
};

use crate::error::PipelineError;
use crate::session::TransferSession;

/// Escapes text for HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn validating() -> String {
    "🔍 Validating link...".to_string()
}

pub fn starting_download() -> String {
    "⏳ Starting download...".to_string()
}

/// Why a submitted link was refused.
pub fn link_rejected(error: &LinkError) -> String {
    match error {
        LinkError::InvalidUrl(_) => "❌ Invalid URL format. Please provide a valid URL.".into(),
        LinkError::UnsupportedScheme(_) => "❌ URL must start with http:// or https://".into(),
        LinkError::HttpStatus(code) => format!("❌ URL returned error code: {code}"),
        LinkError::Timeout => {
            "❌ Connection timeout. Please check the URL and try again.".into()
        }
        LinkError::Network(e) => format!("❌ Error validating link: {}", escape_html(e)),
        LinkError::NotADirectLink => {
            "❌ This doesn't appear to be a direct download link. It may be a web page.".into()
        }
    }
}

/// Summary shown after a link is accepted, before the name choice.
pub fn link_accepted(session: &TransferSession) -> String {
    format!(
        "✅ Link validated successfully!\n\n\
         <b>File Name:</b> <code>{}</code>\n\
         <b>File Size:</b> {}\n\n\
         Choose an option:",
        escape_html(&session.suggested_name),
        format_size_or_unknown(session.declared_size)
    )
}

pub fn rename_prompt(session: &TransferSession) -> String {
    format!(
        "✏️ Current filename: <code>{}</code>\n\n\
         Please send the new filename (with extension):",
        escape_html(&session.suggested_name)
    )
}

pub fn invalid_name() -> String {
    "❌ Invalid filename. Please try again:".to_string()
}

pub fn session_expired() -> String {
    "❌ Session expired. Please start over with /download".to_string()
}

pub fn cancelled() -> String {
    "❌ Operation cancelled. Send /download to start again.".to_string()
}

/// Download progress frame. Rate and ETA lines appear once measurable.
pub fn downloading(
    bytes: u64,
    total: Option<u64>,
    percent: Option<u8>,
    rate: Option<f64>,
    eta: Option<Duration>,
    bar_width: usize,
) -> String {
    let mut text = format!(
        "⬇️ <b>Downloading...</b>\n\n\
         {} {}\n\n\
         📦 {} / {}",
        progress_bar(percent, bar_width),
        percent_label(percent),
        format_size(bytes),
        format_size_or_unknown(total)
    );
    if let Some(rate) = rate {
        text.push_str(&format!("\n⚡ {}", format_rate(rate)));
    }
    if let Some(eta) = eta {
        text.push_str(&format!("\n⏱ {} left", format_elapsed(eta)));
    }
    text
}

/// Categorized explanation for a terminal failure.
pub fn failure(error: &PipelineError, size: Option<u64>) -> String {
    match error {
        e if e.is_cancellation() => cancelled(),
        PipelineError::SizeExceeded { size, limit } => too_large(*size, *limit),
        PipelineError::Download(e) => download_failed(e, size),
        PipelineError::Upload(e) => upload_failed(e, size),
        PipelineError::SessionExpired | PipelineError::NameNotChosen => session_expired(),
        other => format!(
            "❌ <b>Transfer Failed</b>\n\n<code>{}</code>\n\n\
             Please try again or contact support.",
            escape_html(&other.to_string())
        ),
    }
}

fn too_large(size: u64, limit: u64) -> String {
    format!(
        "❌ <b>File exceeds the upload limit!</b>\n\n\
         📦 <b>File size:</b> {}\n\
         ⚠️ <b>Limit:</b> {}\n\n\
         💡 <b>Solutions:</b>\n\
         • Use a file compression tool\n\
         • Split the file into smaller parts\n\
         • Upload to cloud storage (Google Drive, Mega, etc.)",
        format_size(size),
        format_size(limit)
    )
}

fn download_failed(error: &DownloadError, size: Option<u64>) -> String {
    let head = "❌ <b>Download Failed</b>\n\n";
    match error {
        DownloadError::Network(_) => format!("{head}{}", network_advice(size)),
        DownloadError::Stalled(_) => format!(
            "{head}⚠️ <b>Download stalled</b>\n\n\
             The server stopped sending data.\n\n\
             💡 <b>Suggestions:</b>\n\
             • The remote server may be overloaded\n\
             • Try again later\n\
             • Check that the link is still valid"
        ),
        other => format!(
            "{head}<code>{}</code>\n\nPlease try again or contact support.",
            escape_html(&other.to_string())
        ),
    }
}

fn upload_failed(error: &UploadError, size: Option<u64>) -> String {
    let head = "❌ <b>Upload Failed</b>\n\n";
    match error {
        UploadError::Exhausted { last, .. } => match last.category() {
            FailureCategory::Network => format!("{head}{}", network_advice(size)),
            FailureCategory::Timeout => format!(
                "{head}⚠️ <b>Upload timeout</b>\n\n\
                 The file took too long to upload.\n\n\
                 💡 <b>Suggestions:</b>\n\
                 • Your upload speed may be slow\n\
                 • Try during better network conditions\n\
                 • Consider using a smaller file"
            ),
            FailureCategory::Other => format!(
                "{head}<code>{}: {}</code>\n\nPlease try again or contact support.",
                transport_error_label(last),
                escape_html(&last.to_string())
            ),
        },
        UploadError::Cancelled => cancelled(),
    }
}

fn network_advice(size: Option<u64>) -> String {
    format!(
        "⚠️ <b>Network connection issue</b>\n\n\
         The transfer was interrupted due to network problems.\n\n\
         💡 <b>Possible causes:</b>\n\
         • Unstable internet connection\n\
         • File is very large ({})\n\
         • Server connectivity issues\n\n\
         🔄 <b>Please try:</b>\n\
         • Check your internet connection\n\
         • Try again during off-peak hours\n\
         • Use a wired connection if possible\n\
         • Try a smaller file first to test",
        size.map_or_else(|| "unknown".to_string(), format_size)
    )
}

fn transport_error_label(error: &TransportError) -> &'static str {
    match error {
        TransportError::Network(_) => "NetworkError",
        TransportError::Timeout(_) => "TimedOut",
        TransportError::NotModified => "NotModified",
        TransportError::Api { .. } => "ApiError",
        TransportError::Io(_) => "IoError",
    }
}
