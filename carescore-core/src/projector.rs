//! Feature projection
//!
//! Maps a member record onto the exact feature order a model was trained on.
//!
//! Global invariants enforced:
//! - Output order equals the requested feature order
//! - Absent features are filled with 0.0 and reported, never rejected
//! - No range validation; values pass through unchanged

use crate::member::{FeatureValue, MemberRecord};

/// A member projected onto one model's feature list
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub values: Vec<f64>,
    /// Requested features absent from the record (filled with 0.0)
    pub missing: Vec<String>,
    /// Requested features holding a categorical value (projected as NaN)
    pub categorical: Vec<String>,
}

impl Projection {
    /// True when every projected value is a finite number
    pub fn is_numeric(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// Project `record` onto `feature_names`, in that order
pub fn project(record: &MemberRecord, feature_names: &[String]) -> Projection {
    let mut values = Vec::with_capacity(feature_names.len());
    let mut missing = Vec::new();
    let mut categorical = Vec::new();

    for name in feature_names {
        match record.get(name) {
            Some(FeatureValue::Number(v)) => values.push(*v),
            Some(FeatureValue::Category(_)) => {
                categorical.push(name.clone());
                values.push(f64::NAN);
            }
            None => {
                missing.push(name.clone());
                values.push(0.0);
            }
        }
    }

    Projection {
        values,
        missing,
        categorical,
    }
}
