//! Status texts shown while the outbound leg runs.

use std::time::Duration;

use linkrelay_transfer::{format_elapsed, format_size, spinner_frame};

use crate::transport::FailureCategory;

/// Shown once before the first attempt.
pub fn upload_started(size: u64) -> String {
    format!(
        "📤 <b>Uploading...</b>\n\n\
         📦 {}\n\
         ⏳ Please wait, this may take several minutes...",
        format_size(size)
    )
}

/// Heartbeat frame for an attempt in flight.
pub fn upload_heartbeat(size: u64, elapsed: Duration, tick: usize) -> String {
    format!(
        "📤 <b>Uploading...</b>\n\n\
         {} <b>In Progress</b>\n\n\
         📦 Size: {}\n\
         ⏱️ Time: {}\n\n\
         ⏳ Please wait, do not close the bot...",
        spinner_frame(tick),
        format_size(size),
        format_elapsed(elapsed)
    )
}

/// Shown while waiting before the next attempt.
pub fn upload_retrying(
    category: FailureCategory,
    next_attempt: u32,
    max_attempts: u32,
    wait: Duration,
) -> String {
    format!(
        "⚠️ <b>Upload Interrupted</b>\n\n\
         Error: {category}\n\n\
         🔄 Retrying... (Attempt {next_attempt}/{max_attempts})\n\
         ⏳ Waiting {} seconds...",
        wait.as_secs()
    )
}

/// Caption attached to the delivered document.
pub fn delivered_caption(size: u64) -> String {
    format!(
        "✅ File uploaded successfully!\n📦 Size: {}",
        format_size(size)
    )
}
