//! State names, postal abbreviations and population constants.

use crate::config::StateConfig;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct StateLexicon {
    states:          Vec<StateConfig>,
    by_name:         HashMap<String, usize>,
    by_abbreviation: HashMap<String, usize>,
}

impl StateLexicon {
    pub fn new(states: Vec<StateConfig>) -> Self {
        let by_name = states
            .iter()
            .enumerate()
            .map(|(i, s)| (normalize_name(&s.name), i))
            .collect();
        let by_abbreviation = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.abbreviation.to_ascii_uppercase(), i))
            .collect();
        Self { states, by_name, by_abbreviation }
    }

    pub fn states(&self) -> &[StateConfig] {
        &self.states
    }

    /// Canonical state name for a case- and whitespace-insensitive name.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(&normalize_name(name))
            .map(|&i| self.states[i].name.as_str())
    }

    /// Canonical state name for an uppercase postal abbreviation.
    pub fn by_abbreviation(&self, abbreviation: &str) -> Option<&str> {
        self.by_abbreviation
            .get(abbreviation)
            .map(|&i| self.states[i].name.as_str())
    }

    pub fn population(&self, state: &str) -> Option<u64> {
        self.by_name
            .get(&normalize_name(state))
            .map(|&i| self.states[i].population)
    }

    /// Full names ordered longest first, so alternations prefer
    /// "West Virginia" over "Virginia".
    pub fn names_longest_first(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.states.iter().map(|s| s.name.as_str()).collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names
    }
}

/// Lowercase with single spaces.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
