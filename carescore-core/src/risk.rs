//! Risk score normalization and tiering
//!
//! Global invariants enforced:
//! - Deterministic risk calculations
//! - Monotonic transforms: a larger magnitude never yields a lower score,
//!   a larger score never yields a lower tier
//!
//! Scores are relative to the other horizons of the same member (min/max over
//! one request), not calibrated against a population. Two members' scores
//! are not comparable.

use crate::horizon::PerHorizon;
use crate::narrative::round_to;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal digits kept on a normalized score; tiers are read from the rounded score
pub const SCORE_PRECISION: usize = 2;

/// Ordinal risk tier, 1 (lowest) to 5 (highest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskTier(u8);

impl RiskTier {
    pub const MIN: RiskTier = RiskTier(1);
    pub const MAX: RiskTier = RiskTier(5);

    /// Returns `None` outside 1..=5
    pub fn new(value: u8) -> Option<RiskTier> {
        (RiskTier::MIN.0..=RiskTier::MAX.0)
            .contains(&value)
            .then_some(RiskTier(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lower bounds of tiers 2-5 (half-open: `score < tier2` is tier 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    pub tier2: f64,
    pub tier3: f64,
    pub tier4: f64,
    pub tier5: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        TierThresholds {
            tier2: 5.0,
            tier3: 10.0,
            tier4: 15.0,
            tier5: 20.0,
        }
    }
}

/// Rescaling parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Score assigned to the largest magnitude of a request
    pub scale: f64,
    /// Added to the denominator so equal magnitudes normalize to 0
    pub epsilon: f64,
}

impl Default for Normalization {
    fn default() -> Self {
        Normalization {
            scale: 20.0,
            epsilon: 1e-6,
        }
    }
}

/// Score and tier for one horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonRisk {
    pub score: f64,
    pub tier: RiskTier,
}

/// Assign tier with default thresholds
pub fn assign_tier(score: f64) -> RiskTier {
    assign_tier_with_thresholds(score, &TierThresholds::default())
}

/// Assign tier with custom thresholds
pub fn assign_tier_with_thresholds(score: f64, thresholds: &TierThresholds) -> RiskTier {
    if score < thresholds.tier2 {
        RiskTier(1)
    } else if score < thresholds.tier3 {
        RiskTier(2)
    } else if score < thresholds.tier4 {
        RiskTier(3)
    } else if score < thresholds.tier5 {
        RiskTier(4)
    } else {
        RiskTier(5)
    }
}

/// Rescale one magnitude given the request's min and max (unrounded)
///
/// `(raw - min) / (max - min + epsilon) * scale`
pub fn normalize_magnitude(raw: f64, min: f64, max: f64, params: &Normalization) -> f64 {
    (raw - min) / (max - min + params.epsilon) * params.scale
}

/// Min and max over the magnitudes that are present
fn bounds(raw: &PerHorizon<Option<f64>>) -> Option<(f64, f64)> {
    raw.iter()
        .filter_map(|(_, v)| *v)
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Normalize and tier every available horizon of one request.
///
/// Horizons without a magnitude stay `None`; min and max are taken over the
/// horizons that have one.
pub fn stratify(
    raw: &PerHorizon<Option<f64>>,
    params: &Normalization,
    thresholds: &TierThresholds,
) -> PerHorizon<Option<HorizonRisk>> {
    let Some((min, max)) = bounds(raw) else {
        return PerHorizon::from_fn(|_| None);
    };

    raw.map(|_, magnitude| {
        magnitude.map(|m| {
            let score = round_to(normalize_magnitude(m, min, max, params), SCORE_PRECISION);
            HorizonRisk {
                score,
                tier: assign_tier_with_thresholds(score, thresholds),
            }
        })
    })
}
