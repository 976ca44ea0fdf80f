//! Append-only experiment log persisted as a JSON array.
//!
//! Every append rewrites `experiment_log.json` in full. The read-modify-write
//! runs under an exclusive advisory lock on a sibling `.lock` file and the new
//! content goes through a temp file + rename, so concurrent appenders from
//! several sessions or processes never lose entries or observe a torn file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const LOG_FILE_NAME: &str = "experiment_log.json";
const LOCK_FILE_NAME: &str = "experiment_log.json.lock";

#[derive(Debug, thiserror::Error)]
pub enum ExperimentLogError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize experiment log: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExperimentLogError + '_ {
    move |source| ExperimentLogError::Io { path: path.to_path_buf(), source }
}

#[derive(Debug, Clone)]
pub struct ExperimentLog {
    dir: PathBuf,
}

impl ExperimentLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    /// Append one entry, injecting an ISO-8601 `timestamp` when absent.
    ///
    /// Returns the number of entries in the log after the append.
    pub fn append(&self, mut entry: Map<String, Value>) -> Result<usize, ExperimentLogError> {
        if !entry.contains_key("timestamp") {
            entry.insert(
                "timestamp".to_string(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }

        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let lock_path = self.dir.join(LOCK_FILE_NAME);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_err(&lock_path))?;
        lock.lock_exclusive().map_err(io_err(&lock_path))?;

        let result = self.append_locked(entry);

        if let Err(e) = fs2::FileExt::unlock(&lock) {
            warn!(path = %lock_path.display(), error = %e, "Failed to release experiment log lock");
        }
        result
    }

    fn append_locked(&self, entry: Map<String, Value>) -> Result<usize, ExperimentLogError> {
        let mut entries = self.read_entries()?;
        entries.push(Value::Object(entry));

        let path = self.path();
        let tmp_path = self.dir.join(format!("{LOG_FILE_NAME}.tmp"));
        let json = serde_json::to_string_pretty(&entries)?;
        {
            let mut tmp = fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
            tmp.write_all(json.as_bytes()).map_err(io_err(&tmp_path))?;
            tmp.sync_all().map_err(io_err(&tmp_path))?;
        }
        fs::rename(&tmp_path, &path).map_err(io_err(&path))?;

        debug!(path = %path.display(), count = entries.len(), "Experiment logged");
        Ok(entries.len())
    }

    /// All logged entries in insertion order.
    ///
    /// A missing file is an empty log; a corrupt or non-array file is
    /// treated as empty (and will be replaced by the next append).
    pub fn read_entries(&self) -> Result<Vec<Value>, ExperimentLogError> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&path)(e)),
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(_) | Err(_) => {
                warn!(path = %path.display(), "Experiment log is not a JSON array, starting fresh");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_two_appends_preserve_order_and_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let log = ExperimentLog::new(dir.path().join("experiments"));

        assert_eq!(log.append(obj(json!({"name": "baseline", "cv": 0.71}))).unwrap(), 1);
        assert_eq!(log.append(obj(json!({"name": "lgbm", "cv": 0.78}))).unwrap(), 2);

        let raw = std::fs::read_to_string(log.path()).unwrap();
        let entries: Vec<Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "baseline");
        assert_eq!(entries[1]["name"], "lgbm");
        for e in &entries {
            let ts = e["timestamp"].as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok(), "bad timestamp {ts}");
        }
    }

    #[test]
    fn test_existing_timestamp_kept() {
        let dir = tempfile::tempdir().unwrap();
        let log = ExperimentLog::new(dir.path());
        log.append(obj(json!({"timestamp": "2024-01-01T00:00:00"}))).unwrap();
        assert_eq!(log.read_entries().unwrap()[0]["timestamp"], "2024-01-01T00:00:00");
    }

    #[test]
    fn test_corrupt_log_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let log = ExperimentLog::new(dir.path());
        std::fs::write(log.path(), "{not json").unwrap();
        assert!(log.read_entries().unwrap().is_empty());
        assert_eq!(log.append(obj(json!({"a": 1}))).unwrap(), 1);
    }

    #[test]
    fn test_concurrent_appends_do_not_lose_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = ExperimentLog::new(dir.path());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                std::thread::spawn(move || log.append(obj(json!({"run": i}))).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.read_entries().unwrap().len(), 8);
    }
}
