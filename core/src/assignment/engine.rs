//! The classification cascade.
//!
//! DEFAULT ORDER (first match wins):
//!   1. Coordinates  : point-in-polygon, latitude rule for split states
//!   2. Address      : state named in address / declared state
//!   3. Name         : regional nickname, then state in the entity name
//!   4. History      : majority vote over records with the same name
//!
//! After a match, the other independent signals are consulted once more.
//! If any of them names the same region the confidence is raised by the
//! configured boost, capped at 1.0.

use super::{
    strategy::{
        AddressStrategy, ClassificationStrategy, CoordinateStrategy, HistoryStrategy,
        NameStrategy, StrategyOutcome,
    },
    Assignment, AssignmentContext, AssignmentMethod, LocationRecord,
};

pub struct AssignmentEngine {
    strategies: Vec<Box<dyn ClassificationStrategy>>,
}

impl Default for AssignmentEngine {
    fn default() -> Self {
        Self::with_strategies(vec![
            Box::new(CoordinateStrategy),
            Box::new(AddressStrategy),
            Box::new(NameStrategy),
            Box::new(HistoryStrategy),
        ])
    }
}

impl AssignmentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom order. Strategies are tried exactly in the given order.
    pub fn with_strategies(strategies: Vec<Box<dyn ClassificationStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn methods(&self) -> Vec<AssignmentMethod> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    pub fn assign(&self, record: &LocationRecord, ctx: &AssignmentContext) -> Assignment {
        let inputs = record.inputs();
        let mut rationale = Vec::with_capacity(self.strategies.len() + 1);

        for (i, strategy) in self.strategies.iter().enumerate() {
            let method = strategy.method();
            let found = match strategy.attempt(record, ctx) {
                StrategyOutcome::Matched(m) => m,
                StrategyOutcome::NoMatch(reason) => {
                    rationale.push(format!("{}: {reason}", method.as_str()));
                    continue;
                }
            };
            rationale.push(format!("{}: {}", method.as_str(), found.detail));

            let agreeing: Vec<&'static str> = self
                .strategies
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && other.is_independent_signal())
                .filter_map(|(_, other)| match other.attempt(record, ctx) {
                    StrategyOutcome::Matched(m) if m.region == found.region => {
                        Some(other.method().as_str())
                    }
                    _ => None,
                })
                .collect();

            let mut confidence = found.confidence;
            if !agreeing.is_empty() {
                let boost = ctx.classification.agreement_boost;
                confidence += boost;
                rationale.push(format!("boost +{boost:.2}: {} agree", agreeing.join(", ")));
            }

            return Assignment {
                region: Some(found.region),
                method,
                confidence: confidence.clamp(0.0, 1.0),
                rationale,
                inputs,
            };
        }

        Assignment {
            region: None,
            method: AssignmentMethod::None,
            confidence: 0.0,
            rationale,
            inputs,
        }
    }
}
