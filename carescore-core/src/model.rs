//! Pre-trained model interfaces and their JSON-backed implementations
//!
//! Models are fitted offline and consumed here as black boxes. The traits are
//! the seam: anything exposing a feature list plus `assign` / `attribute` can
//! be dropped into a [`crate::bundle::ModelBundle`].
//!
//! Global invariants enforced:
//! - Models are immutable after construction (`&self` only, `Send + Sync`)
//! - Feature list length equals every parameter vector's length
//! - Constructors validate; a constructed model never fails structurally

use crate::error::{AttributionError, ModelError, ScoringError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Clustering model for one horizon
pub trait ClusterModel: Send + Sync {
    /// Ordered features the model expects
    fn feature_names(&self) -> &[String];

    /// Centroid vectors indexed by cluster id
    fn cluster_centers(&self) -> &[Vec<f64>];

    /// Assign a projected vector to a cluster id
    fn assign(&self, vector: &[f64]) -> Result<usize, ScoringError>;

    fn centroid(&self, cluster_id: usize) -> Option<&[f64]> {
        self.cluster_centers().get(cluster_id).map(Vec::as_slice)
    }
}

/// Additive feature-attribution model: one contribution per feature
pub trait AttributionModel: Send + Sync {
    /// Ordered features the model was fitted on
    fn feature_names(&self) -> &[String];

    /// Model output when every feature sits at its expected value
    fn base_value(&self) -> f64;

    /// Per-feature contributions for a single (already preprocessed) instance
    fn attribute(&self, vector: &[f64]) -> Result<Vec<f64>, AttributionError>;
}

fn validate_feature_names(names: &[String]) -> Result<(), ModelError> {
    if names.is_empty() {
        return Err(ModelError::NoFeatures);
    }
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ModelError::DuplicateFeature(name.clone()));
        }
    }
    Ok(())
}

fn validate_parameter(field: &'static str, values: &[f64], expected: usize) -> Result<(), ModelError> {
    if values.len() != expected {
        return Err(ModelError::LengthMismatch {
            field,
            expected,
            got: values.len(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFiniteParameter { field });
    }
    Ok(())
}

/// Names of the features whose projected value is not a finite number
fn non_finite_features(names: &[String], vector: &[f64]) -> Vec<String> {
    names
        .iter()
        .zip(vector)
        .filter(|(_, v)| !v.is_finite())
        .map(|(name, _)| name.clone())
        .collect()
}

/// Euclidean norm of a vector
pub fn euclidean_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Euclidean distance between two vectors of equal length
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Serialized form of a fitted k-means model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansArtifact {
    pub feature_names: Vec<String>,
    pub cluster_centers: Vec<Vec<f64>>,
}

/// k-means model: assignment is the nearest centroid (lowest id on ties)
#[derive(Debug, Clone)]
pub struct KMeansModel {
    feature_names: Vec<String>,
    cluster_centers: Vec<Vec<f64>>,
}

impl KMeansModel {
    pub fn new(feature_names: Vec<String>, cluster_centers: Vec<Vec<f64>>) -> Result<Self, ModelError> {
        validate_feature_names(&feature_names)?;
        if cluster_centers.is_empty() {
            return Err(ModelError::NoCentroids);
        }
        for (cluster, center) in cluster_centers.iter().enumerate() {
            if center.len() != feature_names.len() {
                return Err(ModelError::CentroidDimension {
                    cluster,
                    expected: feature_names.len(),
                    got: center.len(),
                });
            }
            if center.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::NonFiniteCentroid { cluster });
            }
        }
        Ok(KMeansModel {
            feature_names,
            cluster_centers,
        })
    }

    pub fn from_artifact(artifact: KMeansArtifact) -> Result<Self, ModelError> {
        Self::new(artifact.feature_names, artifact.cluster_centers)
    }
}

impl ClusterModel for KMeansModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn cluster_centers(&self) -> &[Vec<f64>] {
        &self.cluster_centers
    }

    fn assign(&self, vector: &[f64]) -> Result<usize, ScoringError> {
        if vector.len() != self.feature_names.len() {
            return Err(ScoringError::DimensionMismatch {
                expected: self.feature_names.len(),
                got: vector.len(),
            });
        }
        let bad = non_finite_features(&self.feature_names, vector);
        if !bad.is_empty() {
            return Err(ScoringError::NonNumeric { features: bad });
        }

        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (id, center) in self.cluster_centers.iter().enumerate() {
            let distance = euclidean_distance(vector, center);
            if distance < best_distance {
                best = id;
                best_distance = distance;
            }
        }
        if !best_distance.is_finite() {
            return Err(ScoringError::NonFiniteDistance);
        }
        Ok(best)
    }
}

/// Serialized form of a fitted linear explainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearExplainerArtifact {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub expected_values: Vec<f64>,
    #[serde(default)]
    pub base_value: f64,
}

/// Exact additive attribution for a linear model with independent features:
/// `phi_i = coef_i * (x_i - E[x_i])`
#[derive(Debug, Clone)]
pub struct LinearExplainer {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    expected_values: Vec<f64>,
    base_value: f64,
}

impl LinearExplainer {
    pub fn new(
        feature_names: Vec<String>,
        coefficients: Vec<f64>,
        expected_values: Vec<f64>,
        base_value: f64,
    ) -> Result<Self, ModelError> {
        validate_feature_names(&feature_names)?;
        validate_parameter("coefficients", &coefficients, feature_names.len())?;
        validate_parameter("expected_values", &expected_values, feature_names.len())?;
        if !base_value.is_finite() {
            return Err(ModelError::NonFiniteParameter {
                field: "base_value",
            });
        }
        Ok(LinearExplainer {
            feature_names,
            coefficients,
            expected_values,
            base_value,
        })
    }

    pub fn from_artifact(artifact: LinearExplainerArtifact) -> Result<Self, ModelError> {
        Self::new(
            artifact.feature_names,
            artifact.coefficients,
            artifact.expected_values,
            artifact.base_value,
        )
    }
}

impl AttributionModel for LinearExplainer {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn base_value(&self) -> f64 {
        self.base_value
    }

    fn attribute(&self, vector: &[f64]) -> Result<Vec<f64>, AttributionError> {
        if vector.len() != self.feature_names.len() {
            return Err(AttributionError::DimensionMismatch {
                expected: self.feature_names.len(),
                got: vector.len(),
            });
        }
        let bad = non_finite_features(&self.feature_names, vector);
        if !bad.is_empty() {
            return Err(AttributionError::NonNumeric { features: bad });
        }

        let contributions: Vec<f64> = vector
            .iter()
            .zip(&self.coefficients)
            .zip(&self.expected_values)
            .map(|((x, coef), expected)| coef * (x - expected))
            .collect();

        if let Some(i) = contributions.iter().position(|c| !c.is_finite()) {
            return Err(AttributionError::NonFiniteContribution {
                feature: self.feature_names[i].clone(),
            });
        }
        Ok(contributions)
    }
}

/// Serialized form of a fitted standard scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Standard scaler: `(x - mean) / scale`, a zero scale leaves the centred value as is
#[derive(Debug, Clone)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(feature_names: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        validate_feature_names(&feature_names)?;
        validate_parameter("mean", &mean, feature_names.len())?;
        validate_parameter("scale", &scale, feature_names.len())?;
        Ok(StandardScaler {
            feature_names,
            mean,
            scale,
        })
    }

    pub fn from_artifact(artifact: ScalerArtifact) -> Result<Self, ModelError> {
        Self::new(artifact.feature_names, artifact.mean, artifact.scale)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Standardise one instance; the caller guarantees matching length
    pub fn transform(&self, vector: &[f64]) -> Vec<f64> {
        vector
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kmeans_assigns_nearest_centroid() {
        let model = KMeansModel::new(
            names(&["a", "b"]),
            vec![vec![0.0, 0.0], vec![10.0, 10.0], vec![-5.0, 5.0]],
        )
        .unwrap();
        assert_eq!(model.assign(&[1.0, 1.0]).unwrap(), 0);
        assert_eq!(model.assign(&[9.0, 8.0]).unwrap(), 1);
        assert_eq!(model.assign(&[-4.0, 6.0]).unwrap(), 2);
    }

    #[test]
    fn test_kmeans_ties_go_to_lowest_id() {
        let model = KMeansModel::new(names(&["a"]), vec![vec![-1.0], vec![1.0]]).unwrap();
        assert_eq!(model.assign(&[0.0]).unwrap(), 0);
    }

    #[test]
    fn test_kmeans_rejects_wrong_dimension() {
        let model = KMeansModel::new(names(&["a", "b"]), vec![vec![0.0, 0.0]]).unwrap();
        assert_eq!(
            model.assign(&[1.0]),
            Err(ScoringError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn test_kmeans_rejects_non_numeric_input() {
        let model = KMeansModel::new(names(&["a", "b"]), vec![vec![0.0, 0.0]]).unwrap();
        assert_eq!(
            model.assign(&[1.0, f64::NAN]),
            Err(ScoringError::NonNumeric {
                features: names(&["b"])
            })
        );
    }

    #[test]
    fn test_kmeans_construction_invariants() {
        assert_eq!(
            KMeansModel::new(names(&["a", "b"]), vec![vec![0.0]]).unwrap_err(),
            ModelError::CentroidDimension {
                cluster: 0,
                expected: 2,
                got: 1
            }
        );
        assert_eq!(
            KMeansModel::new(names(&["a"]), vec![]).unwrap_err(),
            ModelError::NoCentroids
        );
        assert_eq!(
            KMeansModel::new(names(&["a", "a"]), vec![vec![0.0, 0.0]]).unwrap_err(),
            ModelError::DuplicateFeature("a".to_string())
        );
        assert_eq!(
            KMeansModel::new(names(&["a"]), vec![vec![f64::INFINITY]]).unwrap_err(),
            ModelError::NonFiniteCentroid { cluster: 0 }
        );
    }

    #[test]
    fn test_linear_explainer_is_locally_accurate() {
        let explainer = LinearExplainer::new(
            names(&["a", "b", "c"]),
            vec![2.0, -1.0, 0.5],
            vec![1.0, 1.0, 0.0],
            3.0,
        )
        .unwrap();
        let x = [2.0, 4.0, 2.0];
        let phi = explainer.attribute(&x).unwrap();
        assert_eq!(phi, vec![2.0, -3.0, 1.0]);

        // coef·x = 1, intercept = base - coef·E[x] = 2
        let total: f64 = phi.iter().sum();
        assert!((explainer.base_value() + total - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_explainer_rejects_bad_parameters() {
        assert_eq!(
            LinearExplainer::new(names(&["a"]), vec![1.0, 2.0], vec![0.0], 0.0).unwrap_err(),
            ModelError::LengthMismatch {
                field: "coefficients",
                expected: 1,
                got: 2
            }
        );
    }

    #[test]
    fn test_scaler_transform() {
        let scaler =
            StandardScaler::new(names(&["a", "b"]), vec![10.0, 1.0], vec![2.0, 0.0]).unwrap();
        assert_eq!(scaler.transform(&[14.0, 3.0]), vec![2.0, 2.0]);
    }

    #[test]
    fn test_norm_and_distance() {
        assert_eq!(euclidean_norm(&[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0, 1.0], &[4.0, 5.0]), 5.0);
    }
}
