//! Region boundaries, member states and latitude splits.
//!
//! Built once per run and read-only afterwards. A region without a boundary
//! is normal: geometric classification and metrics report it as
//! unclassifiable instead of inventing zero activity.

use crate::{
    config::{GeographyConfig, LatitudeSplitConfig},
    geometry::{Boundary, Point},
    states::normalize_name,
    types::RegionName,
};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Region {
    pub name:     RegionName,
    pub states:   Vec<String>,
    pub boundary: Option<Boundary>,
}

#[derive(Debug, Clone)]
pub struct LatitudeSplit {
    pub state:              String,
    pub boundary:           Option<Boundary>,
    pub threshold_latitude: f64,
    pub north_region:       RegionName,
    pub south_region:       RegionName,
    pub north_keywords:     Vec<String>,
    pub south_keywords:     Vec<String>,
}

impl LatitudeSplit {
    fn from_config(cfg: &LatitudeSplitConfig) -> Self {
        Self {
            state:              cfg.state.clone(),
            boundary:           cfg.boundary.clone().map(Boundary::from),
            threshold_latitude: cfg.threshold_latitude,
            north_region:       cfg.north_region.clone(),
            south_region:       cfg.south_region.clone(),
            north_keywords:     cfg.north_keywords.iter().map(|k| k.to_lowercase()).collect(),
            south_keywords:     cfg.south_keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// The geometric rule: at or above the threshold is north.
    pub fn side_for(&self, p: &Point) -> &str {
        if p.lat >= self.threshold_latitude {
            &self.north_region
        } else {
            &self.south_region
        }
    }

    /// Legacy keyword fallback for text-only records. Returns `None` when no
    /// keyword or keywords from both sides appear.
    pub fn side_for_text(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        let north = self.north_keywords.iter().any(|k| lower.contains(k.as_str()));
        let south = self.south_keywords.iter().any(|k| lower.contains(k.as_str()));
        match (north, south) {
            (true, false) => Some(&self.north_region),
            (false, true) => Some(&self.south_region),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatitudeBand {
    /// `lat >= threshold`
    NorthOf(f64),
    /// `lat < threshold`
    SouthOf(f64),
}

impl LatitudeBand {
    fn admits(&self, p: &Point) -> bool {
        match *self {
            LatitudeBand::NorthOf(t) => p.lat >= t,
            LatitudeBand::SouthOf(t) => p.lat < t,
        }
    }
}

/// What a region covers geometrically.
#[derive(Debug, Clone, Copy)]
pub struct RegionExtent<'a> {
    pub boundary: &'a Boundary,
    pub band:     Option<LatitudeBand>,
}

impl RegionExtent<'_> {
    pub fn contains(&self, p: &Point) -> bool {
        self.band.map_or(true, |b| b.admits(p))
            && self.boundary.bbox_contains(p)
            && self.boundary.contains(p)
    }
}

/// Result of locating a point among all regions.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub region: RegionName,
    /// Every region whose extent contained the point, sorted by name.
    pub claimants: Vec<RegionName>,
}

#[derive(Debug, Clone)]
pub struct RegionBoundaryStore {
    regions:  Vec<Region>,
    splits:   Vec<LatitudeSplit>,
    by_name:  HashMap<RegionName, usize>,
    by_state: HashMap<String, Vec<usize>>,
}

impl RegionBoundaryStore {
    pub fn from_config(geography: &GeographyConfig) -> Self {
        let regions = geography
            .regions
            .iter()
            .map(|r| Region {
                name:     r.name.clone(),
                states:   r.states.clone(),
                boundary: r.boundary.clone().map(Boundary::from),
            })
            .collect();
        let splits = geography.splits.iter().map(LatitudeSplit::from_config).collect();
        Self::new(regions, splits)
    }

    pub fn new(regions: Vec<Region>, splits: Vec<LatitudeSplit>) -> Self {
        let by_name = regions
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        let by_state = Self::index_states(&regions);
        Self { regions, splits, by_name, by_state }
    }

    fn index_states(regions: &[Region]) -> HashMap<String, Vec<usize>> {
        let mut by_state: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, r) in regions.iter().enumerate() {
            for s in &r.states {
                by_state.entry(normalize_name(s)).or_default().push(i);
            }
        }
        by_state
    }

    /// Replace boundaries with persisted ones. A key naming a split state
    /// replaces the shared polygon; a key naming a region, split sub-regions
    /// included, gives that region its own extent. Unknown keys are ignored
    /// with a warning.
    pub fn with_persisted_boundaries(mut self, persisted: HashMap<String, Boundary>) -> Self {
        let mut keys: Vec<_> = persisted.into_iter().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, boundary) in keys {
            if let Some(split) = self
                .splits
                .iter_mut()
                .find(|s| normalize_name(&s.state) == normalize_name(&name))
            {
                split.boundary = Some(boundary);
            } else if let Some(&i) = self.by_name.get(&name) {
                if self.split_for_region(&name).is_some() {
                    log::info!("persisted boundary for '{name}' overrides its split polygon");
                }
                self.regions[i].boundary = Some(boundary);
            } else {
                log::warn!("persisted boundary for unknown region '{name}' ignored");
            }
        }
        self
    }

    /// Replace member-state lists with persisted ones. An empty stored list
    /// keeps the configured members; unknown regions are ignored with a
    /// warning.
    pub fn with_persisted_states(mut self, persisted: HashMap<String, Vec<String>>) -> Self {
        let mut keys: Vec<_> = persisted.into_iter().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, states) in keys {
            if states.is_empty() {
                continue;
            }
            match self.by_name.get(&name) {
                Some(&i) => self.regions[i].states = states,
                None => log::warn!("persisted member states for unknown region '{name}' ignored"),
            }
        }
        self.by_state = Self::index_states(&self.regions);
        self
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.by_name.get(name).map(|&i| &self.regions[i])
    }

    pub fn region_names(&self) -> Vec<&str> {
        self.regions.iter().map(|r| r.name.as_str()).collect()
    }

    fn split_for_region(&self, name: &str) -> Option<&LatitudeSplit> {
        self.splits
            .iter()
            .find(|s| s.north_region == name || s.south_region == name)
    }

    pub fn split_for_state(&self, state: &str) -> Option<&LatitudeSplit> {
        let key = normalize_name(state);
        self.splits.iter().find(|s| normalize_name(&s.state) == key)
    }

    /// Regions listing `state` as a member, in configuration order.
    pub fn regions_for_state(&self, state: &str) -> Vec<&str> {
        self.by_state
            .get(&normalize_name(state))
            .map(|ix| ix.iter().map(|&i| self.regions[i].name.as_str()).collect())
            .unwrap_or_default()
    }

    /// The region's extent, or `None` when the region has no boundary yet.
    /// A region's own boundary wins; otherwise split sub-regions share their
    /// state's polygon, restricted by latitude.
    pub fn get_boundary(&self, name: &str) -> Option<RegionExtent<'_>> {
        if let Some(boundary) = self.own_boundary(name) {
            return Some(RegionExtent { boundary, band: None });
        }
        let split = self.split_for_region(name)?;
        let band = if split.north_region == name {
            LatitudeBand::NorthOf(split.threshold_latitude)
        } else {
            LatitudeBand::SouthOf(split.threshold_latitude)
        };
        split
            .boundary
            .as_ref()
            .map(|boundary| RegionExtent { boundary, band: Some(band) })
    }

    fn own_boundary(&self, name: &str) -> Option<&Boundary> {
        self.region(name)?.boundary.as_ref()
    }

    fn centroid_of(&self, name: &str) -> Option<Point> {
        self.get_boundary(name).and_then(|e| e.boundary.centroid())
    }

    /// Every region whose extent contains `p`. Split polygons are tested
    /// once and resolved by their latitude rule, unless the resolved side
    /// has a boundary of its own.
    pub fn claimants(&self, p: &Point) -> Vec<RegionName> {
        let mut out = Vec::new();
        for split in &self.splits {
            if let Some(b) = &split.boundary {
                let side = split.side_for(p);
                if self.own_boundary(side).is_none() && b.bbox_contains(p) && b.contains(p) {
                    out.push(side.to_string());
                }
            }
        }
        for r in &self.regions {
            if let Some(b) = &r.boundary {
                if b.bbox_contains(p) && b.contains(p) {
                    out.push(r.name.clone());
                }
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Locate `p`; overlapping claims go to the nearest centroid, then name.
    pub fn locate(&self, p: &Point) -> Option<Located> {
        let claimants = self.claimants(p);
        let region = match claimants.as_slice() {
            [] => return None,
            [only] => only.clone(),
            many => many
                .iter()
                .map(|name| {
                    let d = self
                        .centroid_of(name)
                        .map_or(f64::INFINITY, |c| c.distance_sq(p));
                    (d, name)
                })
                .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)))
                .map(|(_, name)| name.clone())?,
        };
        Some(Located { region, claimants })
    }
}
