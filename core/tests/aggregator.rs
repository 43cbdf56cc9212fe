//! Paginated aggregator tests.
//!
//! Tests cover: page counting, short-page termination, the hard cap, retry
//! and abort behaviour, id batching.

use regionscope_core::{
    aggregator::{Fetched, PaginatedAggregator, RangeSource},
    config::AggregatorConfig,
    error::{RegionError, RegionResult},
    store::{Condition, RangeQuery, Table},
};
use rusqlite::types::Value;
use std::cell::RefCell;
use std::collections::HashMap;

/// In-memory row source with a per-request ceiling and injectable failures.
struct VecSource {
    rows:     Vec<i64>,
    ceiling:  usize,
    /// Remaining failures keyed by page start offset.
    failures: RefCell<HashMap<usize, u32>>,
    /// `(start, end, ids in IN filter)` for every request received.
    calls:    RefCell<Vec<(usize, usize, usize)>>,
}

impl VecSource {
    fn new(count: i64) -> Self {
        Self {
            rows:     (1..=count).collect(),
            ceiling:  1000,
            failures: RefCell::new(HashMap::new()),
            calls:    RefCell::new(Vec::new()),
        }
    }

    fn failing_at(self, start: usize, times: u32) -> Self {
        self.failures.borrow_mut().insert(start, times);
        self
    }

    fn request_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl RangeSource<i64> for VecSource {
    fn fetch_range(&self, query: &RangeQuery, start: usize, end: usize) -> RegionResult<Vec<i64>> {
        let ids: Option<Vec<i64>> = query.conditions().iter().find_map(|c| match c {
            Condition::In(_, values) => Some(
                values
                    .iter()
                    .filter_map(|v| match v {
                        Value::Integer(i) => Some(*i),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        });
        self.calls
            .borrow_mut()
            .push((start, end, ids.as_ref().map_or(0, |ids| ids.len())));

        if let Some(remaining) = self.failures.borrow_mut().get_mut(&start) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RegionError::Other(anyhow::anyhow!("connection reset")));
            }
        }

        let end = end.min(start + self.ceiling);
        Ok(self
            .rows
            .iter()
            .copied()
            .filter(|r| ids.as_ref().map_or(true, |ids| ids.contains(r)))
            .skip(start)
            .take(end.saturating_sub(start))
            .collect())
    }
}

fn config() -> AggregatorConfig {
    AggregatorConfig {
        page_size:      1000,
        hard_cap:       50_000,
        id_batch_size:  200,
        max_retries:    3,
        backoff_ms:     0,
        max_backoff_ms: 0,
    }
}

fn query() -> RangeQuery {
    RangeQuery::new(Table::Event)
}

#[test]
fn large_set_is_fetched_in_full_pages() {
    let source = VecSource::new(2500);
    let fetched: Fetched<i64> = PaginatedAggregator::new(config())
        .fetch_all(&source, &query())
        .unwrap();

    assert_eq!(fetched.rows.len(), 2500);
    assert_eq!(fetched.pages, 3);
    assert_eq!(fetched.requests, 3, "the short third page ends the fetch");
    assert!(!fetched.capped);
    assert_eq!(fetched.rows, (1..=2500).collect::<Vec<_>>(), "rows keep source order");
}

#[test]
fn exact_page_multiple_needs_one_empty_probe() {
    let source = VecSource::new(1000);
    let fetched: Fetched<i64> = PaginatedAggregator::new(config())
        .fetch_all(&source, &query())
        .unwrap();

    assert_eq!(fetched.rows.len(), 1000);
    assert_eq!(fetched.pages, 1);
    assert_eq!(fetched.requests, 2);
}

#[test]
fn empty_source_yields_no_pages() {
    let source = VecSource::new(0);
    let fetched: Fetched<i64> = PaginatedAggregator::new(config())
        .fetch_all(&source, &query())
        .unwrap();

    assert!(fetched.rows.is_empty());
    assert_eq!(fetched.pages, 0);
    assert_eq!(fetched.requests, 1);
}

#[test]
fn hard_cap_truncates_and_flags() {
    let source = VecSource::new(5000);
    let fetched: Fetched<i64> = PaginatedAggregator::new(AggregatorConfig {
        hard_cap: 2500,
        ..config()
    })
    .fetch_all(&source, &query())
    .unwrap();

    assert_eq!(fetched.rows.len(), 2500);
    assert!(fetched.capped);
    assert_eq!(source.request_count(), 3, "no request is issued past the cap");
}

#[test]
fn reaching_the_cap_on_a_full_page_is_capped() {
    let source = VecSource::new(2000);
    let fetched: Fetched<i64> = PaginatedAggregator::new(AggregatorConfig {
        hard_cap: 2000,
        ..config()
    })
    .fetch_all(&source, &query())
    .unwrap();

    // The second page is full, so rows may remain beyond the cap.
    assert_eq!(fetched.rows.len(), 2000);
    assert!(fetched.capped);
}

#[test]
fn reaching_the_cap_on_a_short_page_is_not_capped() {
    let source = VecSource::new(1500);
    let fetched: Fetched<i64> = PaginatedAggregator::new(AggregatorConfig {
        hard_cap: 1500,
        ..config()
    })
    .fetch_all(&source, &query())
    .unwrap();

    assert_eq!(fetched.rows.len(), 1500);
    assert!(!fetched.capped, "a short last page proves the set is complete");
}

#[test]
fn transient_failures_are_retried() {
    let source = VecSource::new(2500).failing_at(1000, 2);
    let fetched: Fetched<i64> = PaginatedAggregator::new(config())
        .fetch_all(&source, &query())
        .unwrap();

    assert_eq!(fetched.rows.len(), 2500);
    assert_eq!(fetched.requests, 3, "only successful requests are counted");
    assert_eq!(source.request_count(), 5);
}

#[test]
fn exhausted_retries_abort_without_partial_rows() {
    let source = VecSource::new(2500).failing_at(1000, 10);
    let result: RegionResult<Fetched<i64>> =
        PaginatedAggregator::new(config()).fetch_all(&source, &query());

    match result {
        Err(RegionError::PageFetchFailure { start, end, attempts, reason }) => {
            assert_eq!((start, end), (1000, 2000));
            assert_eq!(attempts, 4, "one attempt plus three retries");
            assert!(reason.contains("connection reset"), "reason was: {reason}");
        }
        other => panic!("expected PageFetchFailure, got {other:?}"),
    }
    assert_eq!(source.request_count(), 5, "one page 0 request, four page 1000 attempts");
}

#[test]
fn invalid_queries_are_not_retried() {
    struct Rejecting(RefCell<u32>);
    impl RangeSource<i64> for Rejecting {
        fn fetch_range(&self, _: &RangeQuery, _: usize, _: usize) -> RegionResult<Vec<i64>> {
            *self.0.borrow_mut() += 1;
            Err(RegionError::InvalidQuery { reason: "bad column".into() })
        }
    }

    let source = Rejecting(RefCell::new(0));
    let result: RegionResult<Fetched<i64>> =
        PaginatedAggregator::new(config()).fetch_all(&source, &query());
    assert!(matches!(result, Err(RegionError::InvalidQuery { .. })));
    assert_eq!(*source.0.borrow(), 1);
}

#[test]
fn ids_are_deduplicated_and_batched() {
    let source = VecSource::new(1000);
    let mut ids: Vec<i64> = (1..=450).collect();
    ids.extend(1..=50); // duplicates

    let fetched: Fetched<i64> = PaginatedAggregator::new(config())
        .fetch_by_ids(&source, &RangeQuery::new(Table::Participation), "event_id", &ids)
        .unwrap();

    assert_eq!(fetched.rows.len(), 450);
    let batch_sizes: Vec<usize> = source.calls.borrow().iter().map(|c| c.2).collect();
    assert_eq!(batch_sizes, vec![200, 200, 50]);
    assert_eq!(fetched.requests, 3);
}

#[test]
fn no_ids_means_no_requests() {
    let source = VecSource::new(10);
    let fetched: Fetched<i64> = PaginatedAggregator::new(config())
        .fetch_by_ids(&source, &RangeQuery::new(Table::Participation), "event_id", &[])
        .unwrap();

    assert!(fetched.rows.is_empty());
    assert_eq!(source.request_count(), 0);
}
