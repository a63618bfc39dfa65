//! Typed errors for each pipeline stage
//!
//! Stage errors stay structural (kind plus context) all the way to the
//! serving layer; the report assembler turns recoverable ones into
//! [`crate::report::ReportIssue`] entries.

use crate::horizon::Horizon;
use thiserror::Error;

/// A cluster model could not score one horizon
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("non-numeric values for: {}", .features.join(", "))]
    NonNumeric { features: Vec<String> },

    #[error("model assigned cluster {cluster_id} but has {cluster_count} centroids")]
    UnknownCluster {
        cluster_id: usize,
        cluster_count: usize,
    },

    #[error("distance to centroid is not finite")]
    NonFiniteDistance,
}

/// The attribution model could not explain the member
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttributionError {
    #[error("no attribution model loaded")]
    NoModel,

    #[error("expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("non-numeric values for: {}", .features.join(", "))]
    NonNumeric { features: Vec<String> },

    #[error("attribution produced a non-finite contribution for {feature}")]
    NonFiniteContribution { feature: String },
}

/// A model artifact violates its structural invariants
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model has no features")]
    NoFeatures,

    #[error("duplicate feature name: {0}")]
    DuplicateFeature(String),

    #[error("model has no cluster centers")]
    NoCentroids,

    #[error("centroid {cluster} has {got} components, expected {expected}")]
    CentroidDimension {
        cluster: usize,
        expected: usize,
        got: usize,
    },

    #[error("centroid {cluster} contains a non-finite component")]
    NonFiniteCentroid { cluster: usize },

    #[error("{field} has {got} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{field} contains a non-finite value")]
    NonFiniteParameter { field: &'static str },

    #[error("scaler features do not match attribution model features")]
    ScalerFeatureMismatch,
}

/// A member could not be turned into a report at all
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("member {member_id}: every horizon failed ({})", describe_failures(.failures))]
    AllHorizonsFailed {
        member_id: String,
        failures: Vec<(Horizon, ScoringError)>,
    },
}

fn describe_failures(failures: &[(Horizon, ScoringError)]) -> String {
    failures
        .iter()
        .map(|(horizon, err)| format!("{}: {}", horizon, err))
        .collect::<Vec<_>>()
        .join("; ")
}
