//! Entity name → region or state, by ordered pattern matching.
//!
//! Regional patterns ("NorCal", "DMV", "Pacific Northwest") are always tried
//! before any single-state pattern, because a regional nickname is more
//! specific than a state that may be split or shared.

use super::full_name_regex;
use crate::{config::NamePatternConfig, error::RegionResult, states::StateLexicon};
use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub enum NameMatch {
    Region {
        region:     String,
        confidence: f64,
        pattern:    String,
    },
    State {
        state:      String,
        confidence: f64,
        matched:    String,
    },
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    regex:      Regex,
    region:     String,
    confidence: f64,
}

#[derive(Debug, Clone)]
pub struct NameLocationExtractor {
    regional:           Vec<CompiledPattern>,
    lexicon:            StateLexicon,
    state_names:        Regex,
    state_code:         Regex,
    name_confidence:    f64,
    code_confidence:    f64,
}

impl NameLocationExtractor {
    pub fn new(config: &NamePatternConfig, lexicon: StateLexicon) -> RegionResult<Self> {
        let regional = config
            .regional
            .iter()
            .map(|p| {
                Ok(CompiledPattern {
                    regex:      Regex::new(&p.pattern)?,
                    region:     p.region.clone(),
                    confidence: p.confidence,
                })
            })
            .collect::<RegionResult<Vec<_>>>()?;
        Ok(Self {
            regional,
            state_names: full_name_regex(&lexicon)?,
            state_code: Regex::new(r"\(([A-Z]{2})\)")?,
            lexicon,
            name_confidence: config.state_name_confidence,
            code_confidence: config.state_abbreviation_confidence,
        })
    }

    pub fn extract(&self, name: &str) -> Option<NameMatch> {
        if let Some(p) = self.regional.iter().find(|p| p.regex.is_match(name)) {
            return Some(NameMatch::Region {
                region:     p.region.clone(),
                confidence: p.confidence,
                pattern:    p.regex.as_str().to_string(),
            });
        }

        if let Some(m) = self.state_names.find(name) {
            if let Some(state) = self.lexicon.canonical_name(m.as_str()) {
                return Some(NameMatch::State {
                    state:      state.to_string(),
                    confidence: self.name_confidence,
                    matched:    m.as_str().to_string(),
                });
            }
        }

        self.state_code.captures_iter(name).find_map(|caps| {
            let code = caps.get(1)?.as_str();
            let state = self.lexicon.by_abbreviation(code)?;
            Some(NameMatch::State {
                state:      state.to_string(),
                confidence: self.code_confidence,
                matched:    caps.get(0)?.as_str().to_string(),
            })
        })
    }
}
