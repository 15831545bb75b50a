//! Execution records kept per cell index.

use std::time::Duration;

use serde::{Serialize, Serializer};

use super::output::CellOutput;
use crate::graph::{CellKind, ContentHash};

/// Execution status of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Never executed for its current content.
    NotRun,
    /// Last execution finished without an exception.
    Success,
    /// Last execution raised an exception.
    Error,
    /// Skipped because an upstream provider failed.
    Blocked,
}

impl ExecutionStatus {
    /// Whether dependents of a cell with this status must be blocked.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Blocked)
    }
}

/// What the engine remembers about the cell at one index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub last_content_hash: ContentHash,
    pub kind: CellKind,
    /// Digest of the providers the cell's inputs resolved to.
    #[serde(serialize_with = "hex_u64")]
    pub inputs_fingerprint: u64,
    /// Number of times the cell actually ran.
    pub execution_counter: u64,
    pub output: CellOutput,
    pub status: ExecutionStatus,
    #[serde(rename = "duration_ms", serialize_with = "millis")]
    pub duration: Option<Duration>,
    /// Failed provider that blocked this cell.
    pub blocked_by: Option<usize>,
}

impl ExecutionRecord {
    /// A record for a cell that has not produced anything yet.
    pub fn not_run(content_hash: ContentHash, kind: CellKind, inputs_fingerprint: u64) -> Self {
        Self {
            last_content_hash: content_hash,
            kind,
            inputs_fingerprint,
            execution_counter: 0,
            output: CellOutput::default(),
            status: ExecutionStatus::NotRun,
            duration: None,
            blocked_by: None,
        }
    }
}

fn hex_u64<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:016x}"))
}

fn millis<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(duration) => serializer.serialize_some(&(duration.as_secs_f64() * 1000.0)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_status_and_hashes() {
        let mut record = ExecutionRecord::not_run(ContentHash::of("x = 1"), CellKind::Code, 255);
        record.duration = Some(Duration::from_millis(2));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "not_run");
        assert_eq!(json["inputs_fingerprint"], "00000000000000ff");
        assert_eq!(json["duration_ms"], 2.0);
        assert_eq!(json["kind"], "code");
    }

    #[test]
    fn test_failure_statuses() {
        assert!(ExecutionStatus::Error.is_failure());
        assert!(ExecutionStatus::Blocked.is_failure());
        assert!(!ExecutionStatus::Success.is_failure());
        assert!(!ExecutionStatus::NotRun.is_failure());
    }
}
