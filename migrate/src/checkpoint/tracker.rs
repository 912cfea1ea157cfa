use std::collections::{HashMap, VecDeque};

/// Derives the resume key from the order in which items were queued and finished.
///
/// Items are identified by the key of their last record. Workers finish items out of order, so the
/// watermark only moves across the prefix of queued items that all finished successfully. The first
/// failed item freezes it for the rest of the run, which makes a rerun start before that item.
#[derive(Debug, Default)]
pub struct CheckpointTracker {
    pending: VecDeque<String>,
    finished: HashMap<String, bool>,
    watermark: Option<String>,
    frozen: bool,
}

impl CheckpointTracker {
    /// Creates a tracker with no watermark.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that an item ending with `last_key` was handed to the workers.
    ///
    /// Items must be reported in queue order. Nothing is recorded once the tracker is frozen.
    pub fn item_queued(&mut self, last_key: String) {
        if !self.frozen {
            self.pending.push_back(last_key);
        }
    }

    /// Records a finished item and returns the new watermark if it moved.
    pub fn item_finished(&mut self, last_key: String, failed: bool) -> Option<&str> {
        if self.frozen {
            return None;
        }
        self.finished.insert(last_key, failed);

        let mut advanced = false;
        while let Some(front) = self.pending.front() {
            match self.finished.get(front) {
                Some(false) => {
                    let key = self.pending.pop_front()?;
                    self.finished.remove(&key);
                    self.watermark = Some(key);
                    advanced = true;
                }
                Some(true) => {
                    self.frozen = true;
                    self.pending.clear();
                    self.finished.clear();
                    break;
                }
                None => break,
            }
        }

        if advanced {
            self.watermark.as_deref()
        } else {
            None
        }
    }

    /// Key of the last item of the longest fully applied prefix, if any item finished yet.
    pub fn watermark(&self) -> Option<&str> {
        self.watermark.as_deref()
    }

    /// Whether a failed item stopped the watermark.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(keys: &[&str]) -> CheckpointTracker {
        let mut tracker = CheckpointTracker::new();
        for key in keys {
            tracker.item_queued(key.to_string());
        }
        tracker
    }

    #[test]
    fn watermark_waits_for_the_oldest_item() {
        let mut tracker = queued(&["b", "d", "f"]);

        assert_eq!(tracker.item_finished("d".to_string(), false), None);
        assert_eq!(tracker.watermark(), None);

        assert_eq!(tracker.item_finished("b".to_string(), false), Some("d"));
        assert_eq!(tracker.item_finished("f".to_string(), false), Some("f"));
    }

    #[test]
    fn failed_item_freezes_the_watermark() {
        let mut tracker = queued(&["b", "d", "f"]);

        assert_eq!(tracker.item_finished("b".to_string(), false), Some("b"));
        assert_eq!(tracker.item_finished("d".to_string(), true), None);
        assert!(tracker.is_frozen());

        tracker.item_queued("h".to_string());
        assert_eq!(tracker.item_finished("f".to_string(), false), None);
        assert_eq!(tracker.item_finished("h".to_string(), false), None);
        assert_eq!(tracker.watermark(), Some("b"));
    }

    #[test]
    fn failure_behind_an_unfinished_item_freezes_once_reached() {
        let mut tracker = queued(&["b", "d"]);

        assert_eq!(tracker.item_finished("d".to_string(), true), None);
        assert!(!tracker.is_frozen());

        assert_eq!(tracker.item_finished("b".to_string(), false), Some("b"));
        assert!(tracker.is_frozen());
        assert_eq!(tracker.watermark(), Some("b"));
    }
}
