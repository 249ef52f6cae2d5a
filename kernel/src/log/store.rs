// Run Log Storage
//
// Durability contract for the run log, plus the two stores shipped with
// the kernel: memory (tests, dry runs) and a JSON Lines file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{RunLogError, RunRecord, Seq};

/// Storage backend for run records.
///
/// Properties required from implementations:
/// - Append-only
/// - Ordered
/// - Each append is independent; earlier records are never reopened
pub trait RunLogStore: Send {
    /// Append one record.
    fn append(&mut self, record: &RunRecord) -> Result<(), RunLogError>;

    /// Load all records in order.
    fn load(&self) -> Result<Vec<RunRecord>, RunLogError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRunLogStore {
    records: Vec<RunRecord>,
}

impl RunLogStore for InMemoryRunLogStore {
    /// Enforces gap-free sequence numbers within a run.
    fn append(&mut self, record: &RunRecord) -> Result<(), RunLogError> {
        let expected: Seq = self
            .records
            .iter()
            .rev()
            .find(|r| r.run_id == record.run_id)
            .map(|r| r.seq + 1)
            .unwrap_or(1);

        if record.seq != expected {
            return Err(RunLogError::SequenceConflict {
                expected,
                actual: record.seq,
            });
        }

        self.records.push(record.clone());
        Ok(())
    }

    fn load(&self) -> Result<Vec<RunRecord>, RunLogError> {
        Ok(self.records.clone())
    }
}

/// One JSON object per line, appended to a file shared across runs.
#[derive(Debug)]
pub struct JsonLinesRunLogStore {
    path: PathBuf,
    file: File,
}

impl JsonLinesRunLogStore {
    /// Open `path` for appending, creating it and its parent folders.
    pub fn open(path: &Path) -> Result<Self, RunLogError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| RunLogError::Io(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| RunLogError::Io(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLogStore for JsonLinesRunLogStore {
    fn append(&mut self, record: &RunRecord) -> Result<(), RunLogError> {
        let mut line =
            serde_json::to_vec(record).map_err(|e| RunLogError::Encoding(e.to_string()))?;
        line.push(b'\n');

        // Single write per record so concurrent readers never see half a line.
        self.file
            .write_all(&line)
            .and_then(|_| self.file.flush())
            .map_err(|e| RunLogError::Io(e.to_string()))
    }

    fn load(&self) -> Result<Vec<RunRecord>, RunLogError> {
        let text = fs::read_to_string(&self.path).map_err(|e| RunLogError::Io(e.to_string()))?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(|e| RunLogError::Encoding(e.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{RunEvent, RunLog};

    fn start() -> RunEvent {
        RunEvent::RunStart {
            project_xml: "p".into(),
            json_in: "j".into(),
            save_changes: false,
        }
    }

    #[test]
    fn in_memory_store_rejects_gaps() {
        let mut log = RunLog::new(InMemoryRunLogStore::default());
        log.record(start()).unwrap();

        let mut stray = log.store().load().unwrap().remove(0);
        stray.seq = 5;

        let mut store = log.into_store();
        assert_eq!(
            store.append(&stray),
            Err(RunLogError::SequenceConflict {
                expected: 2,
                actual: 5
            })
        );
    }

    #[test]
    fn json_lines_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");

        let mut first = RunLog::new(JsonLinesRunLogStore::open(&path).unwrap());
        first.record(start()).unwrap();
        drop(first);

        let mut second = RunLog::new(JsonLinesRunLogStore::open(&path).unwrap());
        second.record(start()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        for line in text.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["type"], "run_start");
        }

        let records = second.store().load().unwrap();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].run_id, records[1].run_id);
    }
}
