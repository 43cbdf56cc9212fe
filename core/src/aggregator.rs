//! Pagination-safe retrieval of arbitrarily large row sets.
//!
//! RULES:
//!   - Pages are requested sequentially as `[start, start + page_size)`.
//!   - A short page ends the fetch; so does the hard cap.
//!   - A page that still fails after the retry budget aborts the whole
//!     fetch. Partial row sets are never returned.

use crate::{
    config::AggregatorConfig,
    error::{RegionError, RegionResult},
    store::RangeQuery,
};
use std::{collections::BTreeSet, thread, time::Duration};

/// Anything that can serve id-ordered row ranges for a query.
pub trait RangeSource<R> {
    /// Rows `[start, end)` of `query` in ascending id order. A source with a
    /// per-request ceiling may return fewer rows than asked for.
    fn fetch_range(&self, query: &RangeQuery, start: usize, end: usize) -> RegionResult<Vec<R>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<R> {
    pub rows:     Vec<R>,
    /// Non-empty pages received.
    pub pages:    usize,
    /// Range requests that succeeded, including the final empty one.
    pub requests: usize,
    /// The hard cap stopped the fetch; more rows may exist.
    pub capped:   bool,
}

impl<R> Fetched<R> {
    fn empty() -> Self {
        Self { rows: Vec::new(), pages: 0, requests: 0, capped: false }
    }

    fn absorb(&mut self, other: Fetched<R>) {
        self.rows.extend(other.rows);
        self.pages += other.pages;
        self.requests += other.requests;
        self.capped |= other.capped;
    }
}

#[derive(Debug, Clone)]
pub struct PaginatedAggregator {
    config: AggregatorConfig,
}

impl PaginatedAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn fetch_all<R, S>(&self, source: &S, query: &RangeQuery) -> RegionResult<Fetched<R>>
    where
        S: RangeSource<R> + ?Sized,
    {
        let page_size = self.config.page_size.max(1);
        let hard_cap = self.config.hard_cap;
        let mut fetched = Fetched::empty();
        let mut start = 0;

        loop {
            let end = start + page_size;
            let page = self.fetch_page(source, query, start, end)?;
            fetched.requests += 1;

            let received = page.len();
            if received > 0 {
                fetched.pages += 1;
            }
            fetched.rows.extend(page);
            log::debug!(
                "aggregator: {} [{start}, {end}) -> {received} rows",
                query.table().name()
            );

            if fetched.rows.len() >= hard_cap {
                // Only a full last page means rows may remain beyond the cap.
                if fetched.rows.len() > hard_cap || received == page_size {
                    fetched.rows.truncate(hard_cap);
                    fetched.capped = true;
                    log::warn!(
                        "aggregator: {} fetch stopped at hard cap of {hard_cap} rows",
                        query.table().name()
                    );
                }
                break;
            }
            if received < page_size {
                break;
            }
            start = end;
        }
        Ok(fetched)
    }

    /// Fetch rows whose `column` is one of `ids`, in batches of at most
    /// `id_batch_size` distinct ids.
    pub fn fetch_by_ids<R, S>(
        &self,
        source: &S,
        query:  &RangeQuery,
        column: &'static str,
        ids:    &[i64],
    ) -> RegionResult<Fetched<R>>
    where
        S: RangeSource<R> + ?Sized,
    {
        let distinct: Vec<i64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let mut fetched = Fetched::empty();
        for batch in distinct.chunks(self.config.id_batch_size.max(1)) {
            let batch_query = query.clone().within(column, batch.iter().copied());
            fetched.absorb(self.fetch_all(source, &batch_query)?);
        }
        Ok(fetched)
    }

    fn fetch_page<R, S>(
        &self,
        source: &S,
        query:  &RangeQuery,
        start:  usize,
        end:    usize,
    ) -> RegionResult<Vec<R>>
    where
        S: RangeSource<R> + ?Sized,
    {
        let mut attempt: u32 = 0;
        loop {
            match source.fetch_range(query, start, end) {
                Ok(rows) => return Ok(rows),
                // A malformed query fails the same way every time.
                Err(e @ RegionError::InvalidQuery { .. }) => return Err(e),
                Err(e) if attempt < self.config.max_retries => {
                    let delay = self.backoff(attempt);
                    log::warn!(
                        "aggregator: {} [{start}, {end}) attempt {} failed: {e}; retrying in {delay}ms",
                        query.table().name(),
                        attempt + 1
                    );
                    if delay > 0 {
                        thread::sleep(Duration::from_millis(delay));
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return Err(RegionError::PageFetchFailure {
                        start,
                        end,
                        attempts: attempt + 1,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// `backoff_ms * 2^attempt`, capped at `max_backoff_ms`.
    fn backoff(&self, attempt: u32) -> u64 {
        self.config
            .backoff_ms
            .saturating_mul(1u64 << attempt.min(32))
            .min(self.config.max_backoff_ms)
    }
}
