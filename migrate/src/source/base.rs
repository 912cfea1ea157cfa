use std::future::Future;

use crate::error::MigrateResult;
use crate::types::SourceRecord;

/// A store that can be read in pages ordered by record key.
///
/// Errors must be classified so that transient conditions (timeouts, unavailability, throttling)
/// carry a kind for which [`crate::error::ErrorKind::is_retryable`] returns `true`.
pub trait DocumentSource: Send + Sync + 'static {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Fetches up to `limit` records whose key sorts strictly after `after`, in key order.
    ///
    /// `after = None` starts from the first record. A page shorter than `limit` means the source
    /// is exhausted.
    fn fetch_page(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> impl Future<Output = MigrateResult<Vec<SourceRecord>>> + Send;
}
