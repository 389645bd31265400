//! Durable per-service log storage.
//!
//! Each service gets one newline-delimited JSON file under the project's
//! logs directory. Records are append-only and immutable once written, so a
//! store survives orchestrator restarts with arrival order intact.

mod error;
mod paths;
mod record;
mod store;

pub use error::LogStoreError;
pub use paths::{logs_dir, service_log_file};
pub use record::LogLine;
pub use store::{clear_logs_dir, LogStore};
