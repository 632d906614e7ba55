//! Candidate resolution
//!
//! Turns a catalog entry into at most `max_results` search candidates with one query against
//! the [`SearchIndex`]. Requests are rate limited, individually timed out and retried on
//! transient failures. A search that still fails yields no candidates for that entry.

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::{CatalogEntry, SearchCandidate};
use crate::services::search_index::{SearchError, SearchIndex};
use crate::utils::retry::{retry_transient, RetryPolicy};

/// Bounded, rate-limited front end to a [`SearchIndex`]
pub struct CandidateResolver {
    index: Arc<dyn SearchIndex>,
    /// Shared across all concurrent resolutions
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    timeout: Duration,
    retry: RetryPolicy,
    /// Searches that failed after retries, over the resolver's lifetime
    failures: AtomicUsize,
}

impl CandidateResolver {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        requests_per_second: u32,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            index,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            timeout,
            retry,
            failures: AtomicUsize::new(0),
        }
    }

    /// Searches that ended without candidates because of an error
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Candidates for `entry`, relevance order preserved, never more than `max_results`
    ///
    /// Failures are logged and yield an empty list.
    pub async fn resolve(&self, entry: &CatalogEntry, max_results: usize) -> Vec<SearchCandidate> {
        match self.try_resolve(entry, max_results).await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    title = %entry.title,
                    region = %entry.region,
                    error = %e,
                    "Search failed, entry has no candidates"
                );
                Vec::new()
            }
        }
    }

    /// Like [`resolve`](Self::resolve) but surfaces the search error
    pub async fn try_resolve(
        &self,
        entry: &CatalogEntry,
        max_results: usize,
    ) -> Result<Vec<SearchCandidate>, SearchError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let query = entry.query();

        let mut candidates = retry_transient("search", &self.retry, || async {
            self.rate_limiter.until_ready().await;
            match tokio::time::timeout(self.timeout, self.index.search(&query, max_results)).await {
                Ok(result) => result,
                Err(_) => Err(SearchError::Timeout),
            }
        })
        .await?;

        if candidates.len() > max_results {
            tracing::debug!(
                query = %query,
                returned = candidates.len(),
                max_results,
                "Search index returned more results than requested, truncating"
            );
            candidates.truncate(max_results);
        }

        tracing::debug!(query = %query, candidates = candidates.len(), "Candidates resolved");
        Ok(candidates)
    }
}
