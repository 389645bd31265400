use std::path::{Path, PathBuf};

/// Logs directory for a project root.
#[must_use]
pub fn logs_dir(project_path: &Path) -> PathBuf {
    project_path.join(".localdev").join("logs")
}

/// Log file for one service id inside a logs directory.
///
/// Service ids may contain `$` (system channels) but never path separators.
#[must_use]
pub fn service_log_file(logs_dir: &Path, service_id: &str) -> PathBuf {
    logs_dir.join(format!("{service_id}.jsonl"))
}
