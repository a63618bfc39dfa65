//! Intervention decision rule
//!
//! Compares the expected savings from acting on a member's 90-day risk with
//! the cost of the intervention that risk tier calls for.
//!
//! Global invariants enforced:
//! - Pure: the decision depends only on score, tier, spending and the cost table
//! - Savings equal to cost is not eligible (strict inequality)

use crate::member::{FeatureValue, MemberRecord};
use crate::risk::RiskTier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Intervention cost per tier, index 0 is tier 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterventionCosts([f64; 5]);

impl Default for InterventionCosts {
    fn default() -> Self {
        InterventionCosts([0.0, 100.0, 300.0, 500.0, 1000.0])
    }
}

impl InterventionCosts {
    pub fn new(costs: [f64; 5]) -> Self {
        InterventionCosts(costs)
    }

    pub fn cost(&self, tier: RiskTier) -> f64 {
        self.0[usize::from(tier.get() - 1)]
    }

    pub fn as_array(&self) -> [f64; 5] {
        self.0
    }
}

/// Parameters of the decision rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionRule {
    pub costs: InterventionCosts,
    /// Fraction of spending assumed recoverable per point of risk score
    pub savings_rate: f64,
}

impl Default for DecisionRule {
    fn default() -> Self {
        DecisionRule {
            costs: InterventionCosts::default(),
            savings_rate: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    #[serde(rename = "Care coordination + pharmacy review")]
    CareCoordination,
    #[serde(rename = "Monitor only")]
    MonitorOnly,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::CareCoordination => "Care coordination + pharmacy review",
            RecommendedAction::MonitorOnly => "Monitor only",
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionDecision {
    pub eligible: bool,
    pub expected_savings: f64,
    pub recommended_action: RecommendedAction,
}

/// Why spending could not be read from the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendingIssue {
    Missing,
    NonNumeric(String),
}

impl fmt::Display for SpendingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpendingIssue::Missing => write!(f, "spending is missing; assumed 0"),
            SpendingIssue::NonNumeric(raw) => {
                write!(f, "spending {:?} is not numeric; assumed 0", raw)
            }
        }
    }
}

/// Read total spending from a record; anything unusable counts as 0
pub fn extract_spending(record: &MemberRecord, field: &str) -> (f64, Option<SpendingIssue>) {
    match record.get(field) {
        Some(FeatureValue::Number(v)) if v.is_finite() => (*v, None),
        Some(FeatureValue::Number(v)) => (0.0, Some(SpendingIssue::NonNumeric(v.to_string()))),
        Some(FeatureValue::Category(raw)) => (0.0, Some(SpendingIssue::NonNumeric(raw.clone()))),
        None => (0.0, Some(SpendingIssue::Missing)),
    }
}

/// Apply the rule to the primary-horizon score and tier
pub fn decide(score: f64, tier: RiskTier, spending: f64, rule: &DecisionRule) -> InterventionDecision {
    let expected_savings = (score * spending * rule.savings_rate).round_ties_even();
    let eligible = expected_savings > rule.costs.cost(tier);
    InterventionDecision {
        eligible,
        // normalise -0.0 from negative spending rounding to zero
        expected_savings: if expected_savings == 0.0 { 0.0 } else { expected_savings },
        recommended_action: if eligible {
            RecommendedAction::CareCoordination
        } else {
            RecommendedAction::MonitorOnly
        },
    }
}
