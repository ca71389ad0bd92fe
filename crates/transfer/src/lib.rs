//! Transfer bookkeeping shared by both legs of the relay.
//!
//! - [`progress`]: when to push a progress update, and how fast we are going
//! - [`render`]: bars, sizes, spinners and clocks for status text
//! - [`validation`]: display-name rules for files we write and relay
//! - [`artifact`]: the on-disk file owned by one transfer

pub mod artifact;
pub mod progress;
pub mod render;
pub mod validation;

pub use artifact::DownloadArtifact;
pub use progress::{ProgressSample, RateMeter, ThrottlePolicy, ThrottleState};
pub use render::{
    DEFAULT_BAR_WIDTH, SPINNER_FRAMES, format_elapsed, format_rate, format_size,
    format_size_or_unknown, percent_label, progress_bar, spinner_frame,
};
pub use validation::{NameError, validate_display_name};

/// Name used when neither headers nor the URL yield one.
pub const FALLBACK_NAME: &str = "downloaded_file";
