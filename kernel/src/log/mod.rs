// Run Log
//
// Append-only record of a batch run: one `run_start`, one `drawing` per
// processed document, one `run_end`. Every record is complete on its own,
// so the log can be read while the run is still going.

mod store;

pub use store::{InMemoryRunLogStore, JsonLinesRunLogStore, RunLogStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::DrawingStatus;

/// Position of a record within its run, starting at 1.
pub type Seq = u64;

/// Identifier shared by every record of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RunEvent {
    RunStart {
        project_xml: String,
        json_in: String,
        save_changes: bool,
    },
    Drawing {
        drawing: String,
        status: DrawingStatus,
        matched: usize,
        updated: usize,
        error: Option<String>,
    },
    RunEnd {
        drawings_tried: usize,
        drawings_updated: usize,
        total_matched: usize,
        total_updated: usize,
    },
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: RunId,
    pub seq: Seq,
    pub utc: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RunEvent,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RunLogError {
    #[error("sequence conflict: expected {expected}, got {actual}")]
    SequenceConflict { expected: Seq, actual: Seq },

    #[error("run log I/O failed: {0}")]
    Io(String),

    #[error("run log record is not valid JSON: {0}")]
    Encoding(String),
}

/// Stamps events of one run and hands them to storage.
#[derive(Debug)]
pub struct RunLog<S: RunLogStore> {
    run_id: RunId,
    next_seq: Seq,
    store: S,
}

impl<S: RunLogStore> RunLog<S> {
    pub fn new(store: S) -> Self {
        Self {
            run_id: RunId::new(),
            next_seq: 1,
            store,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Append an event stamped with the current time.
    pub fn record(&mut self, event: RunEvent) -> Result<(), RunLogError> {
        let record = RunRecord {
            run_id: self.run_id,
            seq: self.next_seq,
            utc: Utc::now(),
            event,
        };

        self.store.append(&record)?;
        self.next_seq += 1;
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_stamped_in_order() {
        let mut log = RunLog::new(InMemoryRunLogStore::default());

        log.record(RunEvent::RunStart {
            project_xml: "project.json".into(),
            json_in: "feed.json".into(),
            save_changes: true,
        })
        .unwrap();
        log.record(RunEvent::RunEnd {
            drawings_tried: 0,
            drawings_updated: 0,
            total_matched: 0,
            total_updated: 0,
        })
        .unwrap();

        let records = log.store().load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, 1);
        assert_eq!(records[1].seq, 2);
        assert!(records.iter().all(|r| r.run_id == log.run_id()));
        assert!(records[0].utc <= records[1].utc);
    }

    #[test]
    fn records_serialize_as_tagged_objects() {
        let record = RunRecord {
            run_id: RunId::new(),
            seq: 3,
            utc: Utc::now(),
            event: RunEvent::Drawing {
                drawing: "/proj/a.dwg".into(),
                status: DrawingStatus::Updated,
                matched: 2,
                updated: 1,
                error: None,
            },
        };

        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["type"], "drawing");
        assert_eq!(value["drawing"], "/proj/a.dwg");
        assert_eq!(value["status"], "updated");
        assert_eq!(value["matched"], 2);
        assert_eq!(value["seq"], 3);
        assert!(value["utc"].is_string());
        assert!(value["runId"].is_string());

        let back: RunRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
