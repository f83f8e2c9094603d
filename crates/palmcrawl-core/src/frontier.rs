use std::future::Future;

use crate::error::CrawlError;
use crate::models::FrontierEntry;

/// Durable FIFO crawl frontier backed by a visited set.
///
/// Every mutation must be atomic: a crash leaves the frontier either before or
/// after the operation. `pop` leases an entry instead of deleting it, so an
/// interrupted url returns to its original queue position via
/// [`release_leases`](Frontier::release_leases); the entry is only removed
/// by [`mark_visited`](Frontier::mark_visited).
pub trait Frontier: Send + Sync + Clone {
    /// Enqueue urls at depth 0, skipping visited and already pending ones.
    ///
    /// Returns the number of urls enqueued.
    fn seed(&self, urls: &[String]) -> impl Future<Output = Result<usize, CrawlError>> + Send;

    /// Atomically claim the oldest unclaimed entry.
    ///
    /// Returns `None` if nothing is claimable.
    fn pop(&self) -> impl Future<Output = Result<Option<FrontierEntry>, CrawlError>> + Send;

    /// Enqueue links discovered on a page at `parent_depth`.
    ///
    /// A link is admitted only if `parent_depth + 1 <= max_depth`, its host is
    /// allow-listed and it has not been visited. Returns the number enqueued.
    fn admit_links(
        &self,
        urls: &[String],
        parent_depth: u32,
        max_depth: u32,
    ) -> impl Future<Output = Result<usize, CrawlError>> + Send;

    /// Record the url as processed and drop its pending entry. Irreversible.
    fn mark_visited(&self, url: &str) -> impl Future<Output = Result<(), CrawlError>> + Send;

    fn is_visited(&self, url: &str) -> impl Future<Output = Result<bool, CrawlError>> + Send;

    /// Return claimed but unsettled entries to the queue.
    fn release_leases(&self) -> impl Future<Output = Result<u64, CrawlError>> + Send;

    /// Pending entries, claimed ones included.
    fn pending_count(&self) -> impl Future<Output = Result<i64, CrawlError>> + Send;

    fn visited_count(&self) -> impl Future<Output = Result<i64, CrawlError>> + Send;
}
