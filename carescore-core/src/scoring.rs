//! Cluster distance scoring
//!
//! Turns one member into one raw risk magnitude per horizon: the member is
//! projected onto the horizon's feature list, assigned to a cluster, and the
//! magnitude is read off the assigned centroid.
//!
//! Global invariants enforced:
//! - Magnitudes are finite and non-negative
//! - A failing horizon never prevents the other horizons from scoring

use crate::error::ScoringError;
use crate::horizon::{Horizon, PerHorizon};
use crate::member::MemberRecord;
use crate::model::{euclidean_distance, euclidean_norm, ClusterModel};
use crate::narrative::round_to;
use crate::projector::project;
use serde::{Deserialize, Serialize};

/// Decimal digits kept on a raw magnitude
pub const MAGNITUDE_PRECISION: usize = 4;

/// How a raw magnitude is derived from the assigned centroid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MagnitudePolicy {
    /// `‖member − centroid‖`: how far the member sits from its cluster
    #[default]
    MemberToCentroid,
    /// `‖centroid‖`: how far the cluster sits from the origin (legacy)
    CentroidNorm,
}

impl MagnitudePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MagnitudePolicy::MemberToCentroid => "member-to-centroid",
            MagnitudePolicy::CentroidNorm => "centroid-norm",
        }
    }
}

/// Outcome of scoring one horizon
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonScore {
    pub cluster_id: usize,
    /// Raw magnitude, rounded to [`MAGNITUDE_PRECISION`] digits
    pub magnitude: f64,
    /// Model features the member did not carry (scored as 0.0)
    pub missing: Vec<String>,
}

/// Score one horizon
pub fn score_horizon(
    model: &dyn ClusterModel,
    record: &MemberRecord,
    policy: MagnitudePolicy,
) -> Result<HorizonScore, ScoringError> {
    let projection = project(record, model.feature_names());
    if !projection.categorical.is_empty() {
        return Err(ScoringError::NonNumeric {
            features: projection.categorical,
        });
    }

    let cluster_id = model.assign(&projection.values)?;
    let centroid = model
        .centroid(cluster_id)
        .ok_or(ScoringError::UnknownCluster {
            cluster_id,
            cluster_count: model.cluster_centers().len(),
        })?;

    let magnitude = match policy {
        MagnitudePolicy::MemberToCentroid => euclidean_distance(&projection.values, centroid),
        MagnitudePolicy::CentroidNorm => euclidean_norm(centroid),
    };
    if !magnitude.is_finite() {
        return Err(ScoringError::NonFiniteDistance);
    }

    Ok(HorizonScore {
        cluster_id,
        magnitude: round_to(magnitude, MAGNITUDE_PRECISION),
        missing: projection.missing,
    })
}

/// Score every horizon independently
pub fn score_all<'a>(
    models: impl Fn(Horizon) -> &'a dyn ClusterModel,
    record: &MemberRecord,
    policy: MagnitudePolicy,
) -> PerHorizon<Result<HorizonScore, ScoringError>> {
    PerHorizon::from_fn(|horizon| {
        let result = score_horizon(models(horizon), record, policy);
        match &result {
            Ok(score) => tracing::debug!(
                member_id = %record.id,
                horizon = %horizon,
                cluster_id = score.cluster_id,
                magnitude = score.magnitude,
                "scored horizon"
            ),
            Err(err) => tracing::warn!(
                member_id = %record.id,
                horizon = %horizon,
                error = %err,
                "horizon failed to score"
            ),
        }
        result
    })
}
