//! Run events. Everything worth keeping about a run lands in `run_log`.
//!
//! RULE: Events describe what happened; they never drive control flow.

use crate::types::{RegionName, RunId};
use serde::{Deserialize, Serialize};

/// Every event recorded during a run.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunInitialized {
        run_id:  RunId,
        as_of:   String,
        regions: usize,
    },

    // ── Classification ─────────────────────────────
    ClassificationCompleted {
        kind:         String, // "event" | "club"
        considered:   usize,
        assigned:     usize,
        unassigned:   usize,
        by_method:    Vec<(String, usize)>,
    },

    // ── Metrics ────────────────────────────────────
    RegionMetricsComputed {
        region:                   RegionName,
        entity_count:             u64,
        recent_event_count:       u64,
        active_participant_count: u64,
        total_participations:     u64,
    },
    RegionUnclassifiable {
        region: RegionName,
    },
    TruncationSuspected {
        region: RegionName,
        metric: String,
        value:  u64,
    },
    RegionFailed {
        region: RegionName,
        reason: String,
    },
}

impl RunEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }          => "run_initialized",
            Self::ClassificationCompleted { .. } => "classification_completed",
            Self::RegionMetricsComputed { .. }   => "region_metrics_computed",
            Self::RegionUnclassifiable { .. }    => "region_unclassifiable",
            Self::TruncationSuspected { .. }     => "truncation_suspected",
            Self::RegionFailed { .. }            => "region_failed",
        }
    }
}
