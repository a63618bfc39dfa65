//! Human-readable explanation of an attribution vector
//!
//! Global invariants enforced:
//! - Pure: no IO, no clocks, no randomness
//! - Identical attribution vectors yield byte-for-byte identical text
//! - Ranking is by descending |contribution|, ties in feature order

use crate::attribution::{Attribution, AttributionVector};
use crate::horizon::Horizon;
use crate::member::{FeatureValue, MemberRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in display names for engineered claims features
pub const DEFAULT_FRIENDLY_NAMES: &[(&str, &str)] = &[
    ("comorbidity_count_2010", "Comorbidity count (2010)"),
    ("new_comorbidities_2009", "New diagnoses in 2009"),
    ("new_comorbidities_2010", "New diagnoses in 2010"),
    ("persistent_conditions", "Persistent conditions"),
    ("severity_score", "Severity score"),
    ("total_recent_visits", "Total recent visits (90d)"),
    ("visit_ratio_30_to_90", "Visit ratio (30d/90d)"),
    ("AGE_2010", "Age"),
];

/// Feature whose positive count adds a closing sentence to the story
pub const NEW_DIAGNOSES_FEATURE: &str = "new_comorbidities_2010";

/// Separator between narrative phrases
pub const PHRASE_SEPARATOR: &str = "; ";

/// Ranked explanation of one member's primary-horizon score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    /// Top-k attributions, values rounded to the configured precision
    pub top_features: Vec<Attribution>,
    pub phrases: Vec<String>,
    /// Phrases joined with `"; "`
    pub text: String,
    /// Summary naming the horizon, plus a note on new 2010 diagnoses when present
    pub story: String,
}

/// Turns attribution vectors into ranked phrases
#[derive(Debug, Clone)]
pub struct NarrativeBuilder {
    friendly_names: BTreeMap<String, String>,
    top_k: usize,
    precision: usize,
}

impl Default for NarrativeBuilder {
    fn default() -> Self {
        NarrativeBuilder::new(5, 3)
    }
}

impl NarrativeBuilder {
    pub fn new(top_k: usize, precision: usize) -> Self {
        NarrativeBuilder {
            friendly_names: DEFAULT_FRIENDLY_NAMES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            top_k,
            precision,
        }
    }

    /// Add or override display names
    pub fn with_friendly_names(mut self, names: &BTreeMap<String, String>) -> Self {
        for (feature, display) in names {
            self.friendly_names.insert(feature.clone(), display.clone());
        }
        self
    }

    /// Display name for a feature: table entry, else the humanized raw name
    pub fn display_name(&self, feature: &str) -> String {
        match self.friendly_names.get(feature) {
            Some(name) => name.clone(),
            None => humanize(feature),
        }
    }

    /// Single phrase for one attribution
    pub fn phrase(&self, attribution: &Attribution) -> String {
        let direction = if attribution.contribution > 0.0 {
            "increases"
        } else {
            "decreases"
        };
        format!(
            "{}: {} → {} risk",
            self.display_name(&attribution.feature),
            format_value(attribution.contribution, self.precision),
            direction
        )
    }

    pub fn build(
        &self,
        vector: &AttributionVector,
        record: &MemberRecord,
        horizon: Horizon,
    ) -> Narrative {
        let top = vector.top_k(self.top_k);
        let phrases: Vec<String> = top.iter().map(|a| self.phrase(a)).collect();
        let text = phrases.join(PHRASE_SEPARATOR);
        let mut story = if phrases.is_empty() {
            format!(
                "For the {} window, no feature contributions are available.",
                horizon
            )
        } else {
            format!(
                "For the {} window, the model predicts risk primarily driven by: {}.",
                horizon, text
            )
        };
        let count = new_diagnoses(record);
        if count > 0 {
            story.push_str(&format!(
                " Notably, the patient has {} new diagnosis(es) in 2010 which raises near-term risk.",
                count
            ));
        }

        Narrative {
            top_features: top
                .into_iter()
                .map(|a| Attribution {
                    contribution: round_to(a.contribution, self.precision),
                    feature: a.feature,
                })
                .collect(),
            phrases,
            text,
            story,
        }
    }
}

/// Count of new 2010 diagnoses, truncated; absent or non-numeric reads as 0
fn new_diagnoses(record: &MemberRecord) -> i64 {
    record
        .get(NEW_DIAGNOSES_FEATURE)
        .and_then(FeatureValue::as_f64)
        .filter(|v| v.is_finite())
        .map_or(0, |v| v.trunc() as i64)
}

/// `visit_ratio_30_to_90` -> `Visit Ratio 30 To 90`
pub fn humanize(feature: &str) -> String {
    feature
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Round to `precision` decimal digits, ties to even
pub fn round_to(value: f64, precision: usize) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round_ties_even() / factor;
    // normalise -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn format_value(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, round_to(value, precision))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> MemberRecord {
        MemberRecord::new("m")
    }

    fn sample_vector() -> AttributionVector {
        AttributionVector::from_pairs([
            ("severity_score", 1.23456),
            ("AGE_2010", -0.4),
            ("visit_ratio_30_to_90", 0.0),
            ("chronic_kidney_flag", 2.5),
        ])
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("chronic_kidney_flag"), "Chronic Kidney Flag");
        assert_eq!(humanize("BENE_ESRD_IND"), "Bene Esrd Ind");
        assert_eq!(humanize("__x__y"), "X Y");
    }

    #[test]
    fn test_phrase_format() {
        let builder = NarrativeBuilder::default();
        let phrase = builder.phrase(&Attribution {
            feature: "severity_score".to_string(),
            contribution: 1.23456,
        });
        assert_eq!(phrase, "Severity score: 1.235 → increases risk");

        let phrase = builder.phrase(&Attribution {
            feature: "AGE_2010".to_string(),
            contribution: -0.4,
        });
        assert_eq!(phrase, "Age: -0.400 → decreases risk");
    }

    #[test]
    fn test_zero_contribution_reads_as_decreasing() {
        let builder = NarrativeBuilder::default();
        let phrase = builder.phrase(&Attribution {
            feature: "x".to_string(),
            contribution: -0.0000001,
        });
        assert_eq!(phrase, "X: 0.000 → decreases risk");
    }

    #[test]
    fn test_build_ranks_and_joins() {
        let narrative = NarrativeBuilder::new(3, 2).build(&sample_vector(), &member(), Horizon::Days90);
        assert_eq!(
            narrative.text,
            "Chronic Kidney Flag: 2.50 → increases risk; Severity score: 1.23 → increases risk; Age: -0.40 → decreases risk"
        );
        assert_eq!(narrative.top_features[1].contribution, 1.23);
        assert!(narrative
            .story
            .starts_with("For the 90-day window, the model predicts risk primarily driven by: "));
    }

    #[test]
    fn test_story_mentions_new_diagnoses() {
        let builder = NarrativeBuilder::new(1, 2);
        let record = member().with(NEW_DIAGNOSES_FEATURE, 2.0);
        let narrative = builder.build(&sample_vector(), &record, Horizon::Days90);
        assert_eq!(
            narrative.story,
            "For the 90-day window, the model predicts risk primarily driven by: \
             Chronic Kidney Flag: 2.50 → increases risk. \
             Notably, the patient has 2 new diagnosis(es) in 2010 which raises near-term risk."
        );
    }

    #[test]
    fn test_story_without_new_diagnoses() {
        let builder = NarrativeBuilder::new(1, 2);
        let expected = "For the 90-day window, the model predicts risk primarily driven by: \
                        Chronic Kidney Flag: 2.50 → increases risk.";

        let absent = builder.build(&sample_vector(), &member(), Horizon::Days90);
        assert_eq!(absent.story, expected);

        let zero = member().with(NEW_DIAGNOSES_FEATURE, 0.0);
        assert_eq!(builder.build(&sample_vector(), &zero, Horizon::Days90).story, expected);

        let fraction = member().with(NEW_DIAGNOSES_FEATURE, 0.9);
        assert_eq!(builder.build(&sample_vector(), &fraction, Horizon::Days90).story, expected);
    }

    #[test]
    fn test_round_to_ties_to_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(-0.0625, 3), -0.062);
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = NarrativeBuilder::default();
        let first = builder.build(&sample_vector(), &member(), Horizon::Days90);
        let second = builder.build(&sample_vector(), &member(), Horizon::Days90);
        assert_eq!(first.text.as_bytes(), second.text.as_bytes());
        assert_eq!(first, second);
    }

    #[test]
    fn test_friendly_name_overrides() {
        let mut names = BTreeMap::new();
        names.insert("chronic_kidney_flag".to_string(), "CKD".to_string());
        let builder = NarrativeBuilder::default().with_friendly_names(&names);
        assert_eq!(builder.display_name("chronic_kidney_flag"), "CKD");
        assert_eq!(builder.display_name("severity_score"), "Severity score");
    }

    #[test]
    fn test_empty_vector_story() {
        let narrative = NarrativeBuilder::default().build(&AttributionVector::default(), &member(), Horizon::Days90);
        assert!(narrative.phrases.is_empty());
        assert_eq!(narrative.text, "");
        assert!(narrative.story.contains("no feature contributions"));
    }
}
