use crate::types::SourceRecord;

/// An ordered group of records handed to exactly one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub records: Vec<SourceRecord>,
}

impl WorkItem {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Key of the last record, which marks the item for checkpointing.
    pub fn last_key(&self) -> Option<&str> {
        self.records.last().map(|record| record.key.as_str())
    }
}

/// Message carried by the work channel.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkMessage {
    Item(WorkItem),
    /// No more work. The producer pushes one per worker and each worker consumes exactly one.
    Sentinel,
}
