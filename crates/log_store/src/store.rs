use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::LogStoreError;
use crate::paths::service_log_file;
use crate::record::LogLine;

/// Append-only store for one service's log lines.
///
/// Lines live both in memory (for merging) and on disk (NDJSON). Appends go
/// through a single owner, so readers only ever observe a prefix of the
/// final sequence.
#[derive(Debug)]
pub struct LogStore {
    service_id: String,
    path: PathBuf,
    file: File,
    lines: Vec<LogLine>,
    next_id: u64,
}

impl LogStore {
    /// Opens (or creates) the store for `service_id` under `logs_dir`,
    /// reloading any lines persisted by a previous run.
    pub fn open(logs_dir: &Path, service_id: &str) -> Result<Self, LogStoreError> {
        if service_id.contains(['/', '\\']) {
            return Err(LogStoreError::InvalidServiceId {
                service_id: service_id.to_string(),
            });
        }

        fs::create_dir_all(logs_dir)
            .map_err(|source| LogStoreError::io("creating logs directory", logs_dir, source))?;
        let path = service_log_file(logs_dir, service_id);

        let mut lines = Vec::new();
        if path.exists() {
            let read_file = File::open(&path)
                .map_err(|source| LogStoreError::io("opening log file", &path, source))?;
            let reader = BufReader::new(read_file);
            let mut previous_id = None;
            for (line_index, line_result) in reader.lines().enumerate() {
                let line_number = line_index + 1;
                let raw = line_result
                    .map_err(|source| LogStoreError::io_line(&path, line_number, source))?;
                if raw.trim().is_empty() {
                    continue;
                }
                let record: LogLine = serde_json::from_str(&raw)
                    .map_err(|source| LogStoreError::json_line(&path, line_number, source))?;
                if let Some(previous) = previous_id {
                    if record.id <= previous {
                        return Err(LogStoreError::NonMonotonicId {
                            path,
                            line: line_number,
                            found: record.id,
                            previous,
                        });
                    }
                }
                previous_id = Some(record.id);
                lines.push(record);
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogStoreError::io("opening log file for append", &path, source))?;

        let next_id = lines.last().map(|line| line.id + 1).unwrap_or(0);

        Ok(Self {
            service_id: service_id.to_string(),
            path,
            file,
            lines,
            next_id,
        })
    }

    /// Appends raw output, splitting embedded newlines into one record per
    /// physical line. Returns the records created.
    pub fn append(&mut self, raw_text: &str, timestamp: i64) -> Result<Vec<LogLine>, LogStoreError> {
        let mut created = Vec::new();
        for text in raw_text.split('\n') {
            let record = LogLine::new(self.next_id, timestamp, text.trim_end_matches('\r'));
            self.next_id += 1;
            let json = serde_json::to_string(&record)
                .map_err(|source| LogStoreError::json_serialize(&self.path, source))?;
            self.file
                .write_all(json.as_bytes())
                .and_then(|()| self.file.write_all(b"\n"))
                .map_err(|source| LogStoreError::io("appending log record", &self.path, source))?;
            self.lines.push(record.clone());
            created.push(record);
        }
        Ok(created)
    }

    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Removes the whole logs directory. The next `open` recreates it.
pub fn clear_logs_dir(logs_dir: &Path) -> Result<(), LogStoreError> {
    match fs::remove_dir_all(logs_dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LogStoreError::io("removing logs directory", logs_dir, source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_splits_embedded_newlines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = LogStore::open(dir.path(), "web").expect("open");

        let created = store.append("first\nsecond\r\nthird", 100).expect("append");
        assert_eq!(created.len(), 3);
        assert_eq!(created[0].text, "first");
        assert_eq!(created[1].text, "second");
        assert_eq!(created[2].text, "third");
        assert_eq!(created[0].id, 0);
        assert_eq!(created[2].id, 2);
    }

    #[test]
    fn reopen_recovers_lines_and_id_sequence() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut store = LogStore::open(dir.path(), "api").expect("open");
            store.append("one", 10).expect("append");
            store.append("two", 20).expect("append");
        }

        let mut store = LogStore::open(dir.path(), "api").expect("reopen");
        assert_eq!(store.len(), 2);
        assert_eq!(store.lines()[0].text, "one");
        assert_eq!(store.lines()[1].timestamp, 20);

        let created = store.append("three", 30).expect("append");
        assert_eq!(created[0].id, 2);
    }

    #[test]
    fn stores_are_isolated_per_service() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut a = LogStore::open(dir.path(), "a").expect("open a");
        let mut b = LogStore::open(dir.path(), "b").expect("open b");
        a.append("from a", 1).expect("append");
        b.append("from b", 2).expect("append");

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn clear_removes_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logs = dir.path().join("logs");
        {
            let mut store = LogStore::open(&logs, "web").expect("open");
            store.append("line", 1).expect("append");
        }
        clear_logs_dir(&logs).expect("clear");
        assert!(!logs.exists());

        // Clearing a missing directory is a no-op.
        clear_logs_dir(&logs).expect("clear again");

        let store = LogStore::open(&logs, "web").expect("open after clear");
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_path_separator_service_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = LogStore::open(dir.path(), "../escape").unwrap_err();
        assert!(matches!(err, LogStoreError::InvalidServiceId { .. }));
    }
}
