//! Feature attribution for the primary horizon
//!
//! Wraps a pre-fitted additive attribution model (and the scaler it was fitted
//! behind) and produces one signed contribution per feature for one member.
//!
//! Global invariants enforced:
//! - The underlying model is never mutated
//! - Attribution vectors keep the model's feature order
//! - Top-k selection is a stable sort: ties keep feature order

use crate::error::{AttributionError, ModelError};
use crate::member::MemberRecord;
use crate::model::{AttributionModel, StandardScaler};
use crate::projector::project;
use serde::{Deserialize, Serialize};

/// Pre-fitted attribution model plus optional preprocessing
pub struct AttributionEngine {
    model: Box<dyn AttributionModel>,
    scaler: Option<StandardScaler>,
}

impl AttributionEngine {
    /// The scaler, when present, must list exactly the model's features
    pub fn new(
        model: Box<dyn AttributionModel>,
        scaler: Option<StandardScaler>,
    ) -> Result<Self, ModelError> {
        if let Some(ref s) = scaler {
            if s.feature_names() != model.feature_names() {
                return Err(ModelError::ScalerFeatureMismatch);
            }
        }
        Ok(AttributionEngine { model, scaler })
    }

    pub fn feature_names(&self) -> &[String] {
        self.model.feature_names()
    }

    pub fn has_scaler(&self) -> bool {
        self.scaler.is_some()
    }

    pub fn base_value(&self) -> f64 {
        self.model.base_value()
    }

    /// Attribute the member's projection onto the model's own feature list
    pub fn explain(&self, record: &MemberRecord) -> Result<AttributionVector, AttributionError> {
        let names = self.model.feature_names();
        let projection = project(record, names);
        if !projection.categorical.is_empty() {
            return Err(AttributionError::NonNumeric {
                features: projection.categorical,
            });
        }

        let input = match &self.scaler {
            Some(scaler) => scaler.transform(&projection.values),
            None => projection.values,
        };
        let contributions = self.model.attribute(&input)?;
        if contributions.len() != names.len() {
            return Err(AttributionError::DimensionMismatch {
                expected: names.len(),
                got: contributions.len(),
            });
        }

        Ok(AttributionVector {
            entries: names
                .iter()
                .cloned()
                .zip(contributions)
                .map(|(feature, contribution)| Attribution {
                    feature,
                    contribution,
                })
                .collect(),
        })
    }
}

/// Contribution of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub feature: String,
    pub contribution: f64,
}

/// Per-feature contributions for one member, in model feature order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributionVector {
    entries: Vec<Attribution>,
}

impl AttributionVector {
    /// Build from `(feature, contribution)` pairs, keeping their order
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, f64)>) -> Self {
        AttributionVector {
            entries: pairs
                .into_iter()
                .map(|(feature, contribution)| Attribution {
                    feature: feature.into(),
                    contribution,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[Attribution] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` entries with the largest absolute contribution.
    ///
    /// Ties keep feature order.
    pub fn top_k(&self, k: usize) -> Vec<Attribution> {
        let mut ranked: Vec<&Attribution> = self.entries.iter().collect();
        ranked.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.into_iter().take(k).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearExplainer;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn engine(scaler: Option<StandardScaler>) -> AttributionEngine {
        let explainer = LinearExplainer::new(
            names(&["severity_score", "total_recent_visits"]),
            vec![2.0, 0.5],
            vec![0.0, 0.0],
            1.0,
        )
        .unwrap();
        AttributionEngine::new(Box::new(explainer), scaler).unwrap()
    }

    #[test]
    fn test_explain_without_scaler() {
        let record = MemberRecord::new("m").with("severity_score", 3.0);
        let vector = engine(None).explain(&record).unwrap();
        assert_eq!(
            vector.entries(),
            &[
                Attribution {
                    feature: "severity_score".to_string(),
                    contribution: 6.0
                },
                Attribution {
                    feature: "total_recent_visits".to_string(),
                    contribution: 0.0
                },
            ]
        );
    }

    #[test]
    fn test_explain_applies_scaler() {
        let scaler = StandardScaler::new(
            names(&["severity_score", "total_recent_visits"]),
            vec![1.0, 10.0],
            vec![2.0, 5.0],
        )
        .unwrap();
        let record = MemberRecord::new("m")
            .with("severity_score", 5.0)
            .with("total_recent_visits", 20.0);
        let vector = engine(Some(scaler)).explain(&record).unwrap();
        // scaled: (5-1)/2 = 2 -> 4.0 ; (20-10)/5 = 2 -> 1.0
        assert_eq!(vector.entries()[0].contribution, 4.0);
        assert_eq!(vector.entries()[1].contribution, 1.0);
    }

    #[test]
    fn test_scaler_must_match_model_features() {
        let scaler = StandardScaler::new(names(&["other"]), vec![0.0], vec![1.0]).unwrap();
        let explainer =
            LinearExplainer::new(names(&["severity_score"]), vec![1.0], vec![0.0], 0.0).unwrap();
        assert_eq!(
            AttributionEngine::new(Box::new(explainer), Some(scaler)).err(),
            Some(ModelError::ScalerFeatureMismatch)
        );
    }

    #[test]
    fn test_explain_rejects_categorical_input() {
        let record = MemberRecord::new("m").with_category("severity_score", "high");
        assert_eq!(
            engine(None).explain(&record),
            Err(AttributionError::NonNumeric {
                features: names(&["severity_score"])
            })
        );
    }

    #[test]
    fn test_top_k_orders_by_absolute_value() {
        let vector = AttributionVector::from_pairs([("a", 0.1), ("b", -3.0), ("c", 2.0), ("d", 0.5)]);
        let top: Vec<String> = vector.top_k(3).into_iter().map(|a| a.feature).collect();
        assert_eq!(top, names(&["b", "c", "d"]));
    }

    #[test]
    fn test_top_k_ties_keep_feature_order() {
        let vector = AttributionVector::from_pairs([("x", 1.0), ("y", -1.0), ("z", 1.0)]);
        let top: Vec<String> = vector.top_k(2).into_iter().map(|a| a.feature).collect();
        assert_eq!(top, names(&["x", "y"]));
    }

    #[test]
    fn test_top_k_excludes_everything_below_kth_largest() {
        let values = [0.3, -2.5, 1.1, 0.05, -0.9, 4.0, 0.7, -1.6, 0.2, 3.3];
        let vector = AttributionVector::from_pairs(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("f{}", i), *v)),
        );
        let top = vector.top_k(5);
        assert_eq!(top.len(), 5);

        let mut magnitudes: Vec<f64> = values.iter().map(|v| v.abs()).collect();
        magnitudes.sort_by(|a, b| b.partial_cmp(a).unwrap());
        let fifth = magnitudes[4];
        for entry in &top {
            assert!(entry.contribution.abs() >= fifth);
        }
        let selected: Vec<&str> = top.iter().map(|a| a.feature.as_str()).collect();
        assert_eq!(selected, vec!["f5", "f9", "f1", "f7", "f2"]);
    }
}
