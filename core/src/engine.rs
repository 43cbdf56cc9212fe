//! The run orchestrator.
//!
//! EXECUTION ORDER (fixed):
//!   1. Record the run and `RunInitialized`.
//!   2. Classify events, then clubs. Every assignment overwrites the row.
//!   3. Compute metrics region by region and upsert them by name.
//!
//! RULES:
//!   - The assignment context is built once per run and never mutated.
//!   - A failing region is logged, recorded and skipped; the run goes on.
//!   - Everything worth keeping about a run lands in `run_log`.

use crate::{
    aggregator::{Fetched, PaginatedAggregator},
    assignment::{AssignmentContext, AssignmentEngine, AssignmentMethod},
    config::RegionConfig,
    error::{RegionError, RegionResult},
    event::RunEvent,
    history::HistoricalAssignmentIndex,
    metrics::{RegionMetrics, RegionMetricsCalculator},
    store::{RangeQuery, RegionStore, SiteKind, SiteRow},
    types::{RegionName, RunId},
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub assign:   bool,
    pub metrics:  bool,
    /// Re-classify rows that already carry a region.
    pub reassign: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { assign: true, metrics: true, reassign: false }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationSummary {
    pub kind:       SiteKind,
    pub considered: usize,
    pub assigned:   usize,
    pub unassigned: usize,
    pub by_method:  BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub classifications: Vec<ClassificationSummary>,
    pub metrics:         Vec<RegionMetrics>,
    pub failed:          Vec<(RegionName, String)>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct RegionEngine {
    pub run_id: RunId,
    config:     RegionConfig,
    context:    AssignmentContext,
    assignment: AssignmentEngine,
    aggregator: PaginatedAggregator,
    store:      RegionStore,
}

impl RegionEngine {
    /// Build a fully wired engine: config geography overlaid with persisted
    /// boundaries, and a history index from rows classified so far.
    pub fn build(run_id: RunId, config: RegionConfig, store: RegionStore) -> RegionResult<Self> {
        let aggregator = PaginatedAggregator::new(config.aggregator.clone());
        if aggregator.config().page_size > store.row_ceiling() {
            return Err(RegionError::InvalidConfig {
                reason: format!(
                    "page_size {} exceeds the store row ceiling {}",
                    aggregator.config().page_size,
                    store.row_ceiling()
                ),
            });
        }

        let mut context = AssignmentContext::from_config(&config)?;
        let boundaries = context
            .boundaries
            .clone()
            .with_persisted_boundaries(store.region_boundaries()?)
            .with_persisted_states(store.region_member_states()?);
        context = context.with_boundaries(boundaries);

        let mut prior: Vec<SiteRow> = Vec::new();
        for kind in [SiteKind::Event, SiteKind::Club] {
            let query = RangeQuery::new(kind.table()).not_null("region").not_null("name");
            let fetched: Fetched<SiteRow> = aggregator.fetch_all(&store, &query)?;
            prior.extend(fetched.rows);
        }
        let history = HistoricalAssignmentIndex::build(prior.into_iter().filter_map(|row| {
            Some((row.location.name?, row.region?))
        }));
        log::info!("engine: history index holds {} names", history.len());
        context = context.with_history(history);

        Ok(Self {
            run_id,
            config,
            context,
            assignment: AssignmentEngine::default(),
            aggregator,
            store,
        })
    }

    /// In-memory store, migrated, with the test geography. Used by tests.
    pub fn build_test(run_id: RunId) -> RegionResult<Self> {
        let config = RegionConfig::default_test();
        let store = RegionStore::in_memory()?.with_row_ceiling(config.store.max_rows_per_request);
        store.migrate()?;
        Self::build(run_id, config, store)
    }

    pub fn store(&self) -> &RegionStore {
        &self.store
    }

    pub fn into_store(self) -> RegionStore {
        self.store
    }

    pub fn context(&self) -> &AssignmentContext {
        &self.context
    }

    /// Run every enabled phase in order.
    pub fn run(&self, as_of: NaiveDate, options: RunOptions) -> RegionResult<RunReport> {
        self.initialize(as_of)?;

        let mut report = RunReport::default();
        if options.assign {
            for kind in [SiteKind::Event, SiteKind::Club] {
                report.classifications.push(self.classify_sites(kind, options.reassign)?);
            }
        }
        if options.metrics {
            let computed = self.compute_all_metrics(as_of)?;
            report.metrics = computed.metrics;
            report.failed = computed.failed;
        }
        Ok(report)
    }

    pub fn initialize(&self, as_of: NaiveDate) -> RegionResult<()> {
        self.store.insert_run(&self.run_id, env!("CARGO_PKG_VERSION"))?;
        self.record(&RunEvent::RunInitialized {
            run_id:  self.run_id.clone(),
            as_of:   as_of.format("%Y-%m-%d").to_string(),
            regions: self.context.boundaries.regions().len(),
        })?;
        log::info!("engine: run {} initialized as of {as_of}", self.run_id);
        Ok(())
    }

    /// Classify every row of `kind` without a region (or every row when
    /// `reassign` is set) and write the assignment back.
    pub fn classify_sites(&self, kind: SiteKind, reassign: bool) -> RegionResult<ClassificationSummary> {
        let mut query = RangeQuery::new(kind.table());
        if !reassign {
            query = query.is_null("region");
        }
        // Read everything first; writing while paging would shift offsets.
        let fetched: Fetched<SiteRow> = self.aggregator.fetch_all(&self.store, &query)?;

        let mut summary = ClassificationSummary {
            kind,
            considered: fetched.rows.len(),
            assigned:   0,
            unassigned: 0,
            by_method:  BTreeMap::new(),
        };
        for row in &fetched.rows {
            let assignment = self.assignment.assign(&row.location, &self.context);
            log::debug!(
                "engine: {} {} -> {:?} via {} ({:.2})",
                kind.as_str(),
                row.id,
                assignment.region,
                assignment.method.as_str(),
                assignment.confidence
            );
            self.store.set_region(kind, row.id, &assignment)?;
            if assignment.method == AssignmentMethod::None {
                summary.unassigned += 1;
            } else {
                summary.assigned += 1;
            }
            *summary.by_method.entry(assignment.method.as_str()).or_insert(0) += 1;
        }

        log::info!(
            "engine: classified {} {} rows ({} assigned, {} unassigned)",
            summary.considered,
            kind.as_str(),
            summary.assigned,
            summary.unassigned
        );
        self.record(&RunEvent::ClassificationCompleted {
            kind:       kind.as_str().to_string(),
            considered: summary.considered,
            assigned:   summary.assigned,
            unassigned: summary.unassigned,
            by_method:  summary
                .by_method
                .iter()
                .map(|(m, n)| (m.to_string(), *n))
                .collect(),
        })?;
        Ok(summary)
    }

    /// Metrics for every configured region. Failures are isolated per region.
    pub fn compute_all_metrics(&self, as_of: NaiveDate) -> RegionResult<RunReport> {
        let calculator = RegionMetricsCalculator::new(
            &self.context.boundaries,
            &self.context.lexicon,
            self.aggregator.clone(),
            self.config.metrics.clone(),
        );

        let mut report = RunReport::default();
        for region in self.context.boundaries.region_names() {
            match self.compute_region(&calculator, region, as_of) {
                Ok(metrics) => report.metrics.push(metrics),
                Err(e) => {
                    log::warn!("region={region} metrics: failed: {e}");
                    self.record(&RunEvent::RegionFailed {
                        region: region.to_string(),
                        reason: e.to_string(),
                    })?;
                    report.failed.push((region.to_string(), e.to_string()));
                }
            }
        }
        log::info!(
            "engine: metrics computed for {} regions, {} failed",
            report.metrics.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn compute_region(
        &self,
        calculator: &RegionMetricsCalculator<'_>,
        region:     &str,
        as_of:      NaiveDate,
    ) -> RegionResult<RegionMetrics> {
        let outcome = calculator.compute(&self.store, region, as_of)?;
        let m = outcome.metrics;
        self.store.upsert_region_metrics(&m)?;

        if m.unclassifiable {
            self.record(&RunEvent::RegionUnclassifiable { region: region.to_string() })?;
        }
        for s in &outcome.signatures {
            self.record(&RunEvent::TruncationSuspected {
                region: region.to_string(),
                metric: s.metric.to_string(),
                value:  s.value,
            })?;
        }
        self.record(&RunEvent::RegionMetricsComputed {
            region:                   region.to_string(),
            entity_count:             m.entity_count,
            recent_event_count:       m.recent_event_count,
            active_participant_count: m.active_participant_count,
            total_participations:     m.total_participations,
        })?;
        Ok(m)
    }

    fn record(&self, event: &RunEvent) -> RegionResult<()> {
        self.store.append_run_event(&self.run_id, event)
    }
}
