//! Free-text extractors feeding the address and name strategies.

pub mod address;
pub mod name;

pub use address::{AddressStateExtractor, StateMatch, StateMatchKind};
pub use name::{NameLocationExtractor, NameMatch};

use crate::states::StateLexicon;
use regex::Regex;

/// `(?i)\b(?:west\s+virginia|virginia|...)\b`, longest names first so the
/// leftmost-first alternation picks the longest overlapping name.
pub(crate) fn full_name_regex(lexicon: &StateLexicon) -> Result<Regex, regex::Error> {
    if lexicon.states().is_empty() {
        // Matches nothing.
        return Regex::new(r"[^\s\S]");
    }
    let alternation = lexicon
        .names_longest_first()
        .iter()
        .map(|name| {
            name.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
}
