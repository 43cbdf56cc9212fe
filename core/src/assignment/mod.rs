//! Region assignment for individual records.
//!
//! RULES:
//!   - Assignment is a pure function of the record and the context.
//!   - Strategies run in a fixed priority order; the first match wins.
//!   - A strategy that finds nothing returns `NoMatch` with a reason; it
//!     never errors.

pub mod engine;
pub mod strategy;

pub use engine::AssignmentEngine;
pub use strategy::{
    AddressStrategy, ClassificationStrategy, CoordinateStrategy, HistoryStrategy, NameStrategy,
    StrategyMatch, StrategyOutcome,
};

use crate::{
    boundary_store::RegionBoundaryStore,
    config::{ClassificationConfig, RegionConfig},
    error::RegionResult,
    extract::{AddressStateExtractor, NameLocationExtractor},
    geometry::Point,
    history::HistoricalAssignmentIndex,
    states::StateLexicon,
    types::RegionName,
};
use serde::{Deserialize, Serialize};

/// Input to classification, as supplied by the scrapers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub latitude:       Option<f64>,
    pub longitude:      Option<f64>,
    pub address:        Option<String>,
    pub name:           Option<String>,
    pub declared_state: Option<String>,
}

impl LocationRecord {
    /// The record's coordinate in `(lon, lat)` order. Non-finite,
    /// out-of-range and `(0, 0)` placeholder coordinates count as absent.
    pub fn point(&self) -> Option<Point> {
        let (lat, lon) = (self.latitude?, self.longitude?);
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        if lat == 0.0 && lon == 0.0 {
            return None;
        }
        Some(Point::new(lon, lat))
    }

    pub fn inputs(&self) -> InputFlags {
        InputFlags {
            coordinates:    self.point().is_some(),
            address:        non_blank(&self.address).is_some(),
            name:           non_blank(&self.name).is_some(),
            declared_state: non_blank(&self.declared_state).is_some(),
        }
    }
}

pub(crate) fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    Coordinates,
    Address,
    Name,
    History,
    None,
}

impl AssignmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coordinates => "coordinates",
            Self::Address     => "address",
            Self::Name        => "name",
            Self::History     => "history",
            Self::None        => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFlags {
    pub coordinates:    bool,
    pub address:        bool,
    pub name:           bool,
    pub declared_state: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub region:     Option<RegionName>,
    pub method:     AssignmentMethod,
    /// Relative weight in [0, 1]; not a calibrated probability.
    pub confidence: f64,
    /// One line per strategy attempted, in order.
    pub rationale:  Vec<String>,
    pub inputs:     InputFlags,
}

/// How a state resolves to a reporting region.
#[derive(Debug, Clone, PartialEq)]
pub enum StateResolution {
    Region { region: RegionName, detail: String },
    Ambiguous(String),
    Unmapped(String),
}

/// Everything the strategies read. Built once per run and shared read-only.
#[derive(Debug, Clone)]
pub struct AssignmentContext {
    pub boundaries:     RegionBoundaryStore,
    pub lexicon:        StateLexicon,
    pub address:        AddressStateExtractor,
    pub names:          NameLocationExtractor,
    pub history:        HistoricalAssignmentIndex,
    pub classification: ClassificationConfig,
}

impl AssignmentContext {
    /// Context with an empty history index.
    pub fn from_config(config: &RegionConfig) -> RegionResult<Self> {
        let lexicon = StateLexicon::new(config.states.clone());
        Ok(Self {
            boundaries:     RegionBoundaryStore::from_config(&config.geography),
            address:        AddressStateExtractor::new(lexicon.clone())?,
            names:          NameLocationExtractor::new(&config.name_patterns, lexicon.clone())?,
            lexicon,
            history:        HistoricalAssignmentIndex::default(),
            classification: config.classification.clone(),
        })
    }

    pub fn with_boundaries(mut self, boundaries: RegionBoundaryStore) -> Self {
        self.boundaries = boundaries;
        self
    }

    pub fn with_history(mut self, history: HistoricalAssignmentIndex) -> Self {
        self.history = history;
        self
    }

    /// Map a state to its region. A split state is resolved from `text` with
    /// the legacy keyword list because no coordinate is available here.
    pub fn resolve_state(&self, state: &str, text: &str) -> StateResolution {
        if let Some(split) = self.boundaries.split_for_state(state) {
            return match split.side_for_text(text) {
                Some(region) => StateResolution::Region {
                    region: region.to_string(),
                    detail: format!("{state} split resolved by city keyword"),
                },
                None => StateResolution::Ambiguous(format!(
                    "{state} spans {} and {} and no city keyword matched",
                    split.north_region, split.south_region
                )),
            };
        }
        match self.boundaries.regions_for_state(state).as_slice() {
            [] => StateResolution::Unmapped(format!("{state} belongs to no region")),
            [only] => StateResolution::Region {
                region: only.to_string(),
                detail: format!("{state} is a member of {only}"),
            },
            many => StateResolution::Ambiguous(format!(
                "{state} is listed by {} regions: {}",
                many.len(),
                many.join(", ")
            )),
        }
    }
}
