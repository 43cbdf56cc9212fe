//! The classification strategies, one per input signal.

use super::{non_blank, AssignmentContext, AssignmentMethod, LocationRecord, StateResolution};
use crate::{extract::NameMatch, types::RegionName};

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyMatch {
    pub region:     RegionName,
    pub confidence: f64,
    pub detail:     String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Matched(StrategyMatch),
    /// Nothing confident; the reason goes into the rationale trace.
    NoMatch(String),
}

/// The contract every cascade step fulfills.
pub trait ClassificationStrategy: Send + Sync {
    fn method(&self) -> AssignmentMethod;

    /// Whether this strategy reads its own input field. Derived signals
    /// (history) do not count towards agreement.
    fn is_independent_signal(&self) -> bool {
        true
    }

    fn attempt(&self, record: &LocationRecord, ctx: &AssignmentContext) -> StrategyOutcome;
}

// ── Coordinates ────────────────────────────────────────────────────

pub struct CoordinateStrategy;

impl ClassificationStrategy for CoordinateStrategy {
    fn method(&self) -> AssignmentMethod {
        AssignmentMethod::Coordinates
    }

    fn attempt(&self, record: &LocationRecord, ctx: &AssignmentContext) -> StrategyOutcome {
        let Some(point) = record.point() else {
            let reason = if record.latitude.is_some() || record.longitude.is_some() {
                "coordinates present but invalid"
            } else {
                "no coordinates"
            };
            return StrategyOutcome::NoMatch(reason.into());
        };

        let Some(located) = ctx.boundaries.locate(&point) else {
            return StrategyOutcome::NoMatch(format!(
                "point (lon {:.4}, lat {:.4}) is inside no region boundary",
                point.lon, point.lat
            ));
        };

        let mut detail = format!(
            "point (lon {:.4}, lat {:.4}) inside {}",
            point.lon, point.lat, located.region
        );
        if located.claimants.len() > 1 {
            detail.push_str(&format!(
                "; claimed by [{}], nearest centroid wins",
                located.claimants.join(", ")
            ));
        }
        StrategyOutcome::Matched(StrategyMatch {
            region:     located.region,
            confidence: ctx.classification.coordinate_confidence,
            detail,
        })
    }
}

// ── Address text ───────────────────────────────────────────────────

pub struct AddressStrategy;

impl ClassificationStrategy for AddressStrategy {
    fn method(&self) -> AssignmentMethod {
        AssignmentMethod::Address
    }

    fn attempt(&self, record: &LocationRecord, ctx: &AssignmentContext) -> StrategyOutcome {
        let fields = [
            ("address", non_blank(&record.address)),
            ("declared_state", non_blank(&record.declared_state)),
        ];
        // The split keyword list looks for cities, which live in the address.
        let keyword_text = non_blank(&record.address).unwrap_or_default();

        let mut reasons = Vec::new();
        for (field, text) in fields {
            let Some(text) = text else { continue };
            let Some(found) = ctx.address.extract(text) else {
                reasons.push(format!("{field} names no state"));
                continue;
            };
            match ctx.resolve_state(&found.state, keyword_text) {
                StateResolution::Region { region, detail } => {
                    return StrategyOutcome::Matched(StrategyMatch {
                        region,
                        confidence: ctx.classification.address_confidence,
                        detail: format!("{field} '{}' -> {}; {detail}", found.matched, found.state),
                    });
                }
                StateResolution::Ambiguous(why) | StateResolution::Unmapped(why) => {
                    reasons.push(format!("{field} '{}': {why}", found.matched));
                }
            }
        }

        if reasons.is_empty() {
            StrategyOutcome::NoMatch("no address or declared state".into())
        } else {
            StrategyOutcome::NoMatch(reasons.join("; "))
        }
    }
}

// ── Entity name ────────────────────────────────────────────────────

pub struct NameStrategy;

impl ClassificationStrategy for NameStrategy {
    fn method(&self) -> AssignmentMethod {
        AssignmentMethod::Name
    }

    fn attempt(&self, record: &LocationRecord, ctx: &AssignmentContext) -> StrategyOutcome {
        let Some(name) = non_blank(&record.name) else {
            return StrategyOutcome::NoMatch("no name".into());
        };

        match ctx.names.extract(name) {
            None => StrategyOutcome::NoMatch(format!("name '{name}' matches no pattern")),
            Some(NameMatch::Region { region, confidence, pattern }) => {
                StrategyOutcome::Matched(StrategyMatch {
                    detail: format!("regional pattern {pattern} -> {region}"),
                    region,
                    confidence,
                })
            }
            Some(NameMatch::State { state, confidence, matched }) => {
                let keyword_text = format!(
                    "{name} {}",
                    non_blank(&record.address).unwrap_or_default()
                );
                match ctx.resolve_state(&state, &keyword_text) {
                    StateResolution::Region { region, detail } => {
                        StrategyOutcome::Matched(StrategyMatch {
                            region,
                            confidence,
                            detail: format!("name '{matched}' -> {state}; {detail}"),
                        })
                    }
                    StateResolution::Ambiguous(why) | StateResolution::Unmapped(why) => {
                        StrategyOutcome::NoMatch(format!("name '{matched}': {why}"))
                    }
                }
            }
        }
    }
}

// ── Historical majority vote ───────────────────────────────────────

pub struct HistoryStrategy;

impl ClassificationStrategy for HistoryStrategy {
    fn method(&self) -> AssignmentMethod {
        AssignmentMethod::History
    }

    fn is_independent_signal(&self) -> bool {
        false
    }

    fn attempt(&self, record: &LocationRecord, ctx: &AssignmentContext) -> StrategyOutcome {
        let Some(name) = non_blank(&record.name) else {
            return StrategyOutcome::NoMatch("no name".into());
        };
        match ctx.history.lookup(name) {
            Some(vote) => StrategyOutcome::Matched(StrategyMatch {
                detail: format!(
                    "{} of {} prior records named '{name}' are in {}",
                    vote.votes, vote.total, vote.region
                ),
                region:     vote.region,
                confidence: ctx.classification.history_confidence,
            }),
            None => StrategyOutcome::NoMatch(format!("no prior records named '{name}'")),
        }
    }
}
