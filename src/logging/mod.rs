//! Logging for timerdeck
//!
//! File-based `tracing` output with timestamped log files and age-based
//! retention of old ones.

mod file_writer;
mod retention;

pub use file_writer::{init_file_logging, LogFileInfo, LoggingGuard};
pub use retention::{cleanup_old_logs, cleanup_old_logs_with_retention};

/// Prefix shared by every log file this crate writes
pub const LOG_FILE_PREFIX: &str = "timerdeck-";
