//! Majority-vote lookup of regions previously assigned to the same name.

use crate::types::RegionName;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalVote {
    pub region: RegionName,
    /// Records that voted for `region`.
    pub votes:  u32,
    /// Records sharing the name across all regions.
    pub total:  u32,
}

#[derive(Debug, Clone, Default)]
pub struct HistoricalAssignmentIndex {
    counts: HashMap<String, BTreeMap<RegionName, u32>>,
}

impl HistoricalAssignmentIndex {
    /// Build from `(name, region)` pairs of already classified records.
    pub fn build<I, N, R>(assigned: I) -> Self
    where
        I: IntoIterator<Item = (N, R)>,
        N: AsRef<str>,
        R: Into<RegionName>,
    {
        let mut index = Self::default();
        for (name, region) in assigned {
            index.record(name.as_ref(), region.into());
        }
        index
    }

    pub fn record(&mut self, name: &str, region: RegionName) {
        let key = name_key(name);
        if key.is_empty() {
            return;
        }
        *self.counts.entry(key).or_default().entry(region).or_insert(0) += 1;
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The modal region for `name`; ties go to the alphabetically first region.
    pub fn lookup(&self, name: &str) -> Option<HistoricalVote> {
        let regions = self.counts.get(&name_key(name))?;
        let total = regions.values().sum();
        // BTreeMap iterates by name, and max_by keeps the last maximum, so
        // walk in reverse to keep the first name among ties.
        let (region, votes) = regions
            .iter()
            .rev()
            .max_by(|a, b| a.1.cmp(b.1))?;
        Some(HistoricalVote { region: region.clone(), votes: *votes, total })
    }
}

/// Names match exactly after trimming and case folding.
fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
