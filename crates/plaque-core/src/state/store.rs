//! Execution records indexed by cell position.

use super::record::{ExecutionRecord, ExecutionStatus};

/// Holds the last execution record of every cell position.
///
/// Identity is positional: the record at index `i` belongs to whatever cell
/// currently sits at index `i`, and is trusted only while its content hash
/// and inputs fingerprint still match.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStore {
    records: Vec<ExecutionRecord>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&ExecutionRecord> {
        self.records.get(index)
    }

    /// Store the record of cell `index`. Records must be written in index
    /// order, so `index` is at most one past the last stored record.
    pub fn set(&mut self, index: usize, record: ExecutionRecord) {
        match index.cmp(&self.records.len()) {
            std::cmp::Ordering::Less => self.records[index] = record,
            std::cmp::Ordering::Equal => self.records.push(record),
            std::cmp::Ordering::Greater => {
                // Fill the gap with placeholders so positions stay aligned.
                while self.records.len() < index {
                    let filler = ExecutionRecord::not_run(record.last_content_hash, record.kind, 0);
                    self.records.push(filler);
                }
                self.records.push(record);
            }
        }
    }

    /// Drop records for indices at or beyond `len`.
    pub fn truncate(&mut self, len: usize) {
        if self.records.len() > len {
            tracing::debug!("Dropping {} stale records", self.records.len() - len);
            self.records.truncate(len);
        }
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Indices of cells whose last execution raised or was blocked.
    pub fn failures(&self) -> impl Iterator<Item = usize> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.status.is_failure())
            .map(|(index, _)| index)
    }

    /// Total number of executions across all positions.
    pub fn total_executions(&self) -> u64 {
        self.records.iter().map(|r| r.execution_counter).sum()
    }

    pub fn status(&self, index: usize) -> ExecutionStatus {
        self.get(index)
            .map(|record| record.status)
            .unwrap_or(ExecutionStatus::NotRun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CellKind, ContentHash};

    fn record(source: &str, status: ExecutionStatus, counter: u64) -> ExecutionRecord {
        ExecutionRecord {
            status,
            execution_counter: counter,
            ..ExecutionRecord::not_run(ContentHash::of(source), CellKind::Code, 0)
        }
    }

    #[test]
    fn test_set_and_truncate() {
        let mut store = ExecutionStore::new();
        store.set(0, record("a", ExecutionStatus::Success, 1));
        store.set(1, record("b", ExecutionStatus::Error, 1));
        store.set(2, record("c", ExecutionStatus::Blocked, 0));
        assert_eq!(store.len(), 3);
        assert_eq!(store.failures().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.total_executions(), 2);

        store.set(1, record("b2", ExecutionStatus::Success, 2));
        assert_eq!(store.status(1), ExecutionStatus::Success);

        store.truncate(1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.status(2), ExecutionStatus::NotRun);
    }

    #[test]
    fn test_set_past_end_keeps_positions() {
        let mut store = ExecutionStore::new();
        store.set(2, record("c", ExecutionStatus::Success, 1));
        assert_eq!(store.len(), 3);
        assert_eq!(store.status(0), ExecutionStatus::NotRun);
        assert_eq!(store.get(2).map(|r| r.execution_counter), Some(1));
    }
}
