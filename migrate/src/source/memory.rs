use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, MigrateResult};
use crate::source::DocumentSource;
use crate::types::SourceRecord;

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, SourceRecord>,
    scripted_failures: VecDeque<ErrorKind>,
    fetches: Vec<Option<String>>,
    fetch_delay: Option<Duration>,
}

/// In-memory source ordered by record key.
///
/// Failures can be scripted with [`MemorySource::fail_next`]: each queued kind makes one fetch fail
/// before any data is returned.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = SourceRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.key.clone(), record))
            .collect();

        Self {
            inner: Arc::new(Mutex::new(Inner {
                records,
                ..Inner::default()
            })),
        }
    }

    /// Queues errors returned by the next fetches, one per fetch.
    pub async fn fail_next(&self, kinds: impl IntoIterator<Item = ErrorKind>) {
        let mut inner = self.inner.lock().await;
        inner.scripted_failures.extend(kinds);
    }

    /// Delays every fetch, to keep a run going long enough to interrupt it.
    pub async fn set_fetch_delay(&self, delay: Duration) {
        let mut inner = self.inner.lock().await;
        inner.fetch_delay = Some(delay);
    }

    pub async fn insert(&self, record: SourceRecord) {
        let mut inner = self.inner.lock().await;
        inner.records.insert(record.key.clone(), record);
    }

    /// Cursors of all fetch attempts, failed ones included.
    pub async fn fetch_cursors(&self) -> Vec<Option<String>> {
        self.inner.lock().await.fetches.clone()
    }
}

impl DocumentSource for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn fetch_page(&self, after: Option<&str>, limit: usize) -> MigrateResult<Vec<SourceRecord>> {
        let delay = {
            let mut inner = self.inner.lock().await;
            inner.fetches.push(after.map(str::to_string));
            inner.fetch_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().await;
        if let Some(kind) = inner.scripted_failures.pop_front() {
            bail!(kind, "Scripted source failure", format!("after {after:?}"));
        }

        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };

        Ok(inner
            .records
            .range::<str, _>((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn source(keys: &[&str]) -> MemorySource {
        MemorySource::new(
            keys.iter()
                .map(|key| SourceRecord::new(*key, BTreeMap::new())),
        )
    }

    fn keys(records: &[SourceRecord]) -> Vec<&str> {
        records.iter().map(|record| record.key.as_str()).collect()
    }

    #[tokio::test]
    async fn pages_follow_the_cursor() {
        let source = source(&["c", "a", "d", "b"]);

        let first = source.fetch_page(None, 3).await.unwrap();
        assert_eq!(keys(&first), vec!["a", "b", "c"]);

        let second = source.fetch_page(Some("c"), 3).await.unwrap();
        assert_eq!(keys(&second), vec!["d"]);

        assert_eq!(
            source.fetch_cursors().await,
            vec![None, Some("c".to_string())]
        );
    }

    #[tokio::test]
    async fn scripted_failures_are_returned_in_order() {
        let source = source(&["a"]);
        source
            .fail_next([ErrorKind::SourceTimeout, ErrorKind::SourceQueryFailed])
            .await;

        let first = source.fetch_page(None, 10).await.unwrap_err();
        let second = source.fetch_page(None, 10).await.unwrap_err();
        let third = source.fetch_page(None, 10).await.unwrap();

        assert_eq!(first.kind(), ErrorKind::SourceTimeout);
        assert_eq!(second.kind(), ErrorKind::SourceQueryFailed);
        assert_eq!(keys(&third), vec!["a"]);
    }
}
