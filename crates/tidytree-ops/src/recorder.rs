//! Bounded in-memory history of batch results.

use std::collections::VecDeque;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use tidytree_core::{BatchReport, Summary};

/// Default number of retained entries.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// One recorded batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Monotonic ID, never reused.
    pub id: u64,
    /// Operation name: a rule name, `organize`, `remove_duplicates`, ...
    pub operation: String,
    /// What the batch did.
    pub report: BatchReport,
    /// When it was recorded.
    pub timestamp: SystemTime,
}

/// FIFO history of operations with a fixed capacity.
#[derive(Debug)]
pub struct OperationRecorder {
    entries: VecDeque<OperationRecord>,
    capacity: usize,
    next_id: u64,
}

impl Default for OperationRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl OperationRecorder {
    /// Create a recorder keeping at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
            next_id: 0,
        }
    }

    /// Append a report. Returns the ID assigned to the entry.
    pub fn record(&mut self, operation: impl Into<String>, report: BatchReport) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(OperationRecord {
            id,
            operation: operation.into(),
            report,
            timestamp: SystemTime::now(),
        });

        id
    }

    /// The newest `limit` entries, oldest first.
    pub fn history(&self, limit: usize) -> Vec<&OperationRecord> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).collect()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&OperationRecord> {
        self.entries.back()
    }

    /// Totals over the retained entries.
    pub fn stats(&self) -> Summary {
        Summary::from_reports(self.entries.iter().map(|e| &e.report))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over all entries (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &OperationRecord> {
        self.entries.iter()
    }
}
