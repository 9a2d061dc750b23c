//! Output formatting
//!
//! Human-readable or JSON output, progress bars, and the size/time
//! rendering shared by every command.

mod formatter;
mod progress;

pub use formatter::{Formatter, format_size, format_timestamp};
pub use progress::ProgressBar;

/// Output configuration derived from CLI flags and `[defaults]`
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress bar
    pub no_progress: bool,
    /// Suppress non-error output
    pub quiet: bool,
}
