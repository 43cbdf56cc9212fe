//! Address text → single state name.
//!
//! Full names are preferred over postal abbreviations. Among surviving
//! full-name matches the last one wins, since US addresses end with the
//! state. A name is rejected when it reads as a street ("Georgia St") or as
//! a city followed by another state's code ("Washington, DC").

use super::full_name_regex;
use crate::{error::RegionResult, states::StateLexicon};
use regex::Regex;

/// Words that turn a preceding state name into a street or city name.
const STREET_SUFFIXES: &[&str] = &[
    "st", "street", "ave", "av", "avenue", "rd", "road", "blvd", "boulevard", "dr", "drive",
    "ln", "lane", "way", "pl", "place", "ct", "court", "pkwy", "parkway", "hwy", "highway",
    "ter", "terrace", "cir", "circle", "sq", "square", "trl", "trail", "city",
];

/// Two-letter tokens that usually mean a compass direction.
const DIRECTIONAL_TOKENS: &[&str] = &["N", "S", "E", "W", "NE", "NW", "SE", "SW"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMatchKind {
    FullName,
    Abbreviation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateMatch {
    /// Canonical state name.
    pub state:   String,
    /// The text that matched.
    pub matched: String,
    pub kind:    StateMatchKind,
}

#[derive(Debug, Clone)]
pub struct AddressStateExtractor {
    lexicon:    StateLexicon,
    full_names: Regex,
}

impl AddressStateExtractor {
    pub fn new(lexicon: StateLexicon) -> RegionResult<Self> {
        let full_names = full_name_regex(&lexicon)?;
        Ok(Self { lexicon, full_names })
    }

    pub fn extract(&self, text: &str) -> Option<StateMatch> {
        self.extract_full_name(text)
            .or_else(|| self.extract_abbreviation(text))
    }

    fn extract_full_name(&self, text: &str) -> Option<StateMatch> {
        self.full_names
            .find_iter(text)
            .filter_map(|m| {
                let state = self.lexicon.canonical_name(m.as_str())?;
                let rest = &text[m.end()..];
                if followed_by_street_word(rest) || self.followed_by_other_state_code(rest, state) {
                    log::debug!("address: '{}' rejected by context in '{text}'", m.as_str());
                    return None;
                }
                Some(StateMatch {
                    state:   state.to_string(),
                    matched: m.as_str().to_string(),
                    kind:    StateMatchKind::FullName,
                })
            })
            .last()
    }

    /// "Washington, DC": a state name used as the city of another state.
    fn followed_by_other_state_code(&self, rest: &str, state: &str) -> bool {
        let Some(after_comma) = rest.trim_start().strip_prefix(',') else {
            return false;
        };
        let token: String = after_comma
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if token.len() != 2 || !token.chars().all(|c| c.is_ascii_uppercase()) {
            return false;
        }
        self.lexicon
            .by_abbreviation(&token)
            .is_some_and(|other| other != state)
    }

    fn extract_abbreviation(&self, text: &str) -> Option<StateMatch> {
        let tokens: Vec<&str> = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        for (i, token) in tokens.iter().enumerate().rev() {
            if token.len() != 2 || !token.chars().all(|c| c.is_ascii_uppercase()) {
                continue;
            }
            let Some(state) = self.lexicon.by_abbreviation(token) else {
                continue;
            };
            if DIRECTIONAL_TOKENS.contains(token) {
                let has_postal = tokens.get(i + 1).is_some_and(|next| is_postal_code(next));
                if !has_postal {
                    log::debug!("address: directional token '{token}' without postal code skipped");
                    continue;
                }
            }
            return Some(StateMatch {
                state:   state.to_string(),
                matched: token.to_string(),
                kind:    StateMatchKind::Abbreviation,
            });
        }
        None
    }
}

fn followed_by_street_word(rest: &str) -> bool {
    let word: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_lowercase();
    !word.is_empty() && STREET_SUFFIXES.contains(&word.as_str())
}

/// `21401` or `21401-1234`.
pub fn is_postal_code(token: &str) -> bool {
    let (head, tail) = match token.split_once('-') {
        Some((h, t)) => (h, Some(t)),
        None => (token, None),
    };
    let digits = |s: &str, n: usize| s.len() == n && s.chars().all(|c| c.is_ascii_digit());
    digits(head, 5) && tail.map_or(true, |t| digits(t, 4))
}
