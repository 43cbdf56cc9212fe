//! Per-region aggregate metrics.
//!
//! Candidate rows are read through the paginated aggregator and kept only
//! when their coordinate lies inside the region extent. Nothing here writes;
//! persistence is the caller's job.

use crate::{
    aggregator::{Fetched, PaginatedAggregator, RangeSource},
    boundary_store::RegionBoundaryStore,
    config::MetricsConfig,
    error::{RegionError, RegionResult},
    states::StateLexicon,
    store::{ParticipationRow, PointRow, RangeQuery, Table},
    types::{RegionName, RowId},
};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMetrics {
    pub region_name:              RegionName,
    /// Clubs inside the region.
    pub entity_count:             u64,
    /// Events inside the region dated within the trailing window.
    pub recent_event_count:       u64,
    pub active_participant_count: u64,
    pub total_participations:     u64,
    pub estimated_population:     u64,
    pub activity_ratio:           f64,
    /// The region has no boundary; every count is zero.
    pub unclassifiable:           bool,
    /// A count matched a known page limit and may be silently truncated.
    pub truncation_suspect:       bool,
    pub as_of:                    NaiveDate,
}

impl RegionMetrics {
    fn empty(region_name: &str, as_of: NaiveDate) -> Self {
        Self {
            region_name: region_name.to_string(),
            entity_count: 0,
            recent_event_count: 0,
            active_participant_count: 0,
            total_participations: 0,
            estimated_population: 0,
            activity_ratio: 0.0,
            unclassifiable: false,
            truncation_suspect: false,
            as_of,
        }
    }
}

/// A value that looks like the output of a truncated read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationSignature {
    pub metric: &'static str,
    pub value:  u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsOutcome {
    pub metrics:    RegionMetrics,
    pub signatures: Vec<TruncationSignature>,
}

pub struct RegionMetricsCalculator<'a> {
    boundaries: &'a RegionBoundaryStore,
    lexicon:    &'a StateLexicon,
    aggregator: PaginatedAggregator,
    config:     MetricsConfig,
}

impl<'a> RegionMetricsCalculator<'a> {
    pub fn new(
        boundaries: &'a RegionBoundaryStore,
        lexicon:    &'a StateLexicon,
        aggregator: PaginatedAggregator,
        config:     MetricsConfig,
    ) -> Self {
        Self { boundaries, lexicon, aggregator, config }
    }

    /// First day of the trailing window ending at `as_of`.
    pub fn window_start(&self, as_of: NaiveDate) -> NaiveDate {
        as_of
            .checked_sub_months(Months::new(self.config.window_months))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn compute<S>(&self, source: &S, region: &str, as_of: NaiveDate) -> RegionResult<MetricsOutcome>
    where
        S: RangeSource<PointRow> + RangeSource<ParticipationRow> + ?Sized,
    {
        let definition = self
            .boundaries
            .region(region)
            .ok_or_else(|| RegionError::UnknownRegion { name: region.to_string() })?;

        let Some(extent) = self.boundaries.get_boundary(region) else {
            log::warn!("region={region} metrics: no boundary, reporting as unclassifiable");
            let mut metrics = RegionMetrics::empty(region, as_of);
            metrics.unclassifiable = true;
            return Ok(MetricsOutcome { metrics, signatures: Vec::new() });
        };

        let mut signatures = Vec::new();
        let window_start = self.window_start(as_of);

        // Events in the window.
        let events_query = RangeQuery::new(Table::Event)
            .gte("event_date", window_start.format("%Y-%m-%d").to_string())
            .lte("event_date", as_of.format("%Y-%m-%d").to_string());
        let events: Fetched<PointRow> =
            self.aggregator.fetch_all(source, &events_query)?;
        if events.capped {
            signatures.push(TruncationSignature { metric: "event_candidates", value: events.rows.len() as u64 });
        }
        let event_ids: Vec<RowId> = events
            .rows
            .iter()
            .filter(|r| extent.contains(&r.point))
            .map(|r| r.id)
            .collect();

        // Clubs anywhere.
        let clubs: Fetched<PointRow> =
            self.aggregator.fetch_all(source, &RangeQuery::new(Table::Club))?;
        if clubs.capped {
            signatures.push(TruncationSignature { metric: "club_candidates", value: clubs.rows.len() as u64 });
        }
        let entity_count = clubs.rows.iter().filter(|r| extent.contains(&r.point)).count() as u64;

        // Participation for the kept events.
        let participation: Fetched<ParticipationRow> = self.aggregator.fetch_by_ids(
            source,
            &RangeQuery::new(Table::Participation),
            "event_id",
            &event_ids,
        )?;
        let active: HashSet<&str> = participation
            .rows
            .iter()
            .map(|r| r.participant_id.as_str())
            .collect();

        let mut metrics = RegionMetrics::empty(region, as_of);
        metrics.entity_count = entity_count;
        metrics.recent_event_count = event_ids.len() as u64;
        metrics.active_participant_count = active.len() as u64;
        metrics.total_participations = participation.rows.len() as u64;
        metrics.estimated_population = definition
            .states
            .iter()
            .filter_map(|s| self.lexicon.population(s))
            .sum();
        metrics.activity_ratio = activity_ratio(metrics.total_participations, metrics.active_participant_count);

        for (metric, value) in [
            ("entity_count", metrics.entity_count),
            ("recent_event_count", metrics.recent_event_count),
            ("active_participant_count", metrics.active_participant_count),
            ("total_participations", metrics.total_participations),
        ] {
            if self.config.legacy_page_limits.contains(&value) {
                signatures.push(TruncationSignature { metric, value });
            }
        }
        for s in &signatures {
            log::warn!(
                "region={region} metrics: {} = {} looks truncated; value kept as read",
                s.metric,
                s.value
            );
        }
        metrics.truncation_suspect = !signatures.is_empty();

        log::info!(
            "region={region} metrics: clubs={} events={} participants={} participations={} ratio={:.2}",
            metrics.entity_count,
            metrics.recent_event_count,
            metrics.active_participant_count,
            metrics.total_participations,
            metrics.activity_ratio
        );
        Ok(MetricsOutcome { metrics, signatures })
    }
}

/// Participation records per distinct participant, two decimals.
pub fn activity_ratio(total: u64, active: u64) -> f64 {
    if active == 0 {
        return 0.0;
    }
    (total as f64 / active as f64 * 100.0).round() / 100.0
}
