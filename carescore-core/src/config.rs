//! Configuration file support for carescore
//!
//! Loads scoring configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.carescorerc.json` in the working directory
//! 3. `carescore.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::decision::{DecisionRule, InterventionCosts};
use crate::risk::{Normalization, TierThresholds};
use crate::scoring::MagnitudePolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file names tried during discovery, in priority order
pub const CONFIG_FILE_NAMES: &[&str] = &[".carescorerc.json", "carescore.config.json"];

const DEFAULT_ID_FIELD: &str = "DESYNPUF_ID";
const DEFAULT_SPENDING_FIELD: &str = "total_spending";
const DEFAULT_TOP_K: usize = 5;
const DEFAULT_PRECISION: usize = 3;
const MAX_TOP_K: usize = 50;
const MAX_PRECISION: usize = 6;

/// carescore configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CareScoreConfig {
    /// Score given to the largest magnitude of a request (default: 20.0)
    #[serde(default)]
    pub scale: Option<f64>,

    /// Normalization denominator guard (default: 1e-6)
    #[serde(default)]
    pub epsilon: Option<f64>,

    /// Lower bounds of tiers 2-5
    #[serde(default)]
    pub tier_thresholds: Option<TierThresholdConfig>,

    /// Raw magnitude policy (default: member-to-centroid)
    #[serde(default)]
    pub magnitude: Option<MagnitudePolicy>,

    /// Attribution entries kept in the narrative (default: 5)
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Decimal digits shown for attribution values (default: 3)
    #[serde(default)]
    pub precision: Option<usize>,

    /// Intervention cost per 90-day tier
    #[serde(default)]
    pub intervention_costs: Option<InterventionCostConfig>,

    /// Fraction of spending recoverable per risk point (default: 0.2)
    #[serde(default)]
    pub savings_rate: Option<f64>,

    /// Member id field (default: DESYNPUF_ID)
    #[serde(default)]
    pub id_field: Option<String>,

    /// Total spending field (default: total_spending)
    #[serde(default)]
    pub spending_field: Option<String>,

    /// Display names merged over the built-in table
    #[serde(default)]
    pub friendly_names: BTreeMap<String, String>,

    /// Run attribution by default (default: true)
    #[serde(default)]
    pub explain: Option<bool>,
}

/// Tier threshold configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierThresholdConfig {
    pub tier2: Option<f64>,
    pub tier3: Option<f64>,
    pub tier4: Option<f64>,
    pub tier5: Option<f64>,
}

/// Intervention cost configuration, keyed by tier number
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterventionCostConfig {
    #[serde(rename = "1")]
    pub tier1: Option<f64>,
    #[serde(rename = "2")]
    pub tier2: Option<f64>,
    #[serde(rename = "3")]
    pub tier3: Option<f64>,
    #[serde(rename = "4")]
    pub tier4: Option<f64>,
    #[serde(rename = "5")]
    pub tier5: Option<f64>,
}

/// Resolved configuration ready for use by the engine
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub normalization: Normalization,
    pub thresholds: TierThresholds,
    pub magnitude: MagnitudePolicy,
    pub top_k: usize,
    pub precision: usize,
    pub decision: DecisionRule,
    pub id_field: String,
    pub spending_field: String,
    pub friendly_names: BTreeMap<String, String>,
    pub explain: bool,

    /// Path to the config file that was loaded (if any)
    pub config_path: Option<PathBuf>,
}

impl CareScoreConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let defaults_n = Normalization::default();
        let scale = self.scale.unwrap_or(defaults_n.scale);
        let epsilon = self.epsilon.unwrap_or(defaults_n.epsilon);

        if !scale.is_finite() || scale <= 0.0 {
            anyhow::bail!("scale must be positive (got {})", scale);
        }
        if !epsilon.is_finite() || epsilon <= 0.0 {
            anyhow::bail!("epsilon must be positive (got {})", epsilon);
        }

        let t = self.thresholds();
        for (name, v) in [
            ("tier2", t.tier2),
            ("tier3", t.tier3),
            ("tier4", t.tier4),
            ("tier5", t.tier5),
        ] {
            if !v.is_finite() || v <= 0.0 {
                anyhow::bail!("tier_thresholds.{} must be positive (got {})", name, v);
            }
        }
        for (lower, upper, a, b) in [
            ("tier2", "tier3", t.tier2, t.tier3),
            ("tier3", "tier4", t.tier3, t.tier4),
            ("tier4", "tier5", t.tier4, t.tier5),
        ] {
            if a >= b {
                anyhow::bail!(
                    "tier_thresholds.{} ({}) must be less than tier_thresholds.{} ({})",
                    lower,
                    a,
                    upper,
                    b
                );
            }
        }
        if t.tier5 > scale {
            anyhow::bail!(
                "tier_thresholds.tier5 ({}) must not exceed scale ({})",
                t.tier5,
                scale
            );
        }

        if let Some(k) = self.top_k {
            if k == 0 || k > MAX_TOP_K {
                anyhow::bail!("top_k must be between 1 and {} (got {})", MAX_TOP_K, k);
            }
        }
        if let Some(p) = self.precision {
            if p > MAX_PRECISION {
                anyhow::bail!("precision must be at most {} (got {})", MAX_PRECISION, p);
            }
        }

        let costs = self.costs().as_array();
        for (i, cost) in costs.iter().enumerate() {
            if !cost.is_finite() || *cost < 0.0 {
                anyhow::bail!(
                    "intervention_costs.{} must be non-negative (got {})",
                    i + 1,
                    cost
                );
            }
        }
        for i in 1..costs.len() {
            if costs[i] < costs[i - 1] {
                anyhow::bail!(
                    "intervention_costs.{} ({}) must not be less than intervention_costs.{} ({})",
                    i + 1,
                    costs[i],
                    i,
                    costs[i - 1]
                );
            }
        }

        if let Some(rate) = self.savings_rate {
            if !rate.is_finite() || rate <= 0.0 || rate > 1.0 {
                anyhow::bail!("savings_rate must be in (0, 1] (got {})", rate);
            }
        }

        for (name, value) in [("id_field", &self.id_field), ("spending_field", &self.spending_field)] {
            if let Some(v) = value {
                if v.trim().is_empty() {
                    anyhow::bail!("{} must not be empty", name);
                }
            }
        }

        Ok(())
    }

    fn thresholds(&self) -> TierThresholds {
        let d = TierThresholds::default();
        match &self.tier_thresholds {
            Some(t) => TierThresholds {
                tier2: t.tier2.unwrap_or(d.tier2),
                tier3: t.tier3.unwrap_or(d.tier3),
                tier4: t.tier4.unwrap_or(d.tier4),
                tier5: t.tier5.unwrap_or(d.tier5),
            },
            None => d,
        }
    }

    fn costs(&self) -> InterventionCosts {
        let d = InterventionCosts::default().as_array();
        match &self.intervention_costs {
            Some(c) => InterventionCosts::new([
                c.tier1.unwrap_or(d[0]),
                c.tier2.unwrap_or(d[1]),
                c.tier3.unwrap_or(d[2]),
                c.tier4.unwrap_or(d[3]),
                c.tier5.unwrap_or(d[4]),
            ]),
            None => InterventionCosts::new(d),
        }
    }

    /// Resolve config into the form used by the engine
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let defaults_n = Normalization::default();
        let defaults_rule = DecisionRule::default();

        Ok(ResolvedConfig {
            normalization: Normalization {
                scale: self.scale.unwrap_or(defaults_n.scale),
                epsilon: self.epsilon.unwrap_or(defaults_n.epsilon),
            },
            thresholds: self.thresholds(),
            magnitude: self.magnitude.unwrap_or_default(),
            top_k: self.top_k.unwrap_or(DEFAULT_TOP_K),
            precision: self.precision.unwrap_or(DEFAULT_PRECISION),
            decision: DecisionRule {
                costs: self.costs(),
                savings_rate: self.savings_rate.unwrap_or(defaults_rule.savings_rate),
            },
            id_field: self
                .id_field
                .clone()
                .unwrap_or_else(|| DEFAULT_ID_FIELD.to_string()),
            spending_field: self
                .spending_field
                .clone()
                .unwrap_or_else(|| DEFAULT_SPENDING_FIELD.to_string()),
            friendly_names: self.friendly_names.clone(),
            explain: self.explain.unwrap_or(true),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        CareScoreConfig::default().resolve()
    }
}

/// Discover and load a config file from `dir`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(CareScoreConfig, PathBuf)>> {
    for name in CONFIG_FILE_NAMES {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            tracing::debug!(path = %path.display(), "discovered config file");
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<CareScoreConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: CareScoreConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve configuration
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (CareScoreConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskTier;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = CareScoreConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert_eq!(resolved.normalization.scale, 20.0);
        assert_eq!(resolved.normalization.epsilon, 1e-6);
        assert_eq!(resolved.thresholds, TierThresholds::default());
        assert_eq!(resolved.magnitude, MagnitudePolicy::MemberToCentroid);
        assert_eq!(resolved.top_k, 5);
        assert_eq!(resolved.precision, 3);
        assert_eq!(resolved.decision.savings_rate, 0.2);
        assert_eq!(resolved.id_field, "DESYNPUF_ID");
        assert_eq!(resolved.spending_field, "total_spending");
        assert!(resolved.explain);
    }

    #[test]
    fn test_parse_minimal_config() {
        let json = r#"{}"#;
        let config: CareScoreConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "scale": 100.0,
            "epsilon": 0.001,
            "tier_thresholds": {"tier2": 20, "tier3": 40, "tier4": 60, "tier5": 80},
            "magnitude": "centroid-norm",
            "top_k": 3,
            "precision": 2,
            "intervention_costs": {"1": 0, "2": 50, "3": 150, "4": 400, "5": 900},
            "savings_rate": 0.1,
            "id_field": "member_id",
            "spending_field": "allowed_amount",
            "friendly_names": {"chf_flag": "Heart failure"},
            "explain": false
        }"#;
        let config: CareScoreConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.normalization.scale, 100.0);
        assert_eq!(resolved.thresholds.tier5, 80.0);
        assert_eq!(resolved.magnitude, MagnitudePolicy::CentroidNorm);
        assert_eq!(resolved.top_k, 3);
        assert_eq!(resolved.precision, 2);
        assert_eq!(
            resolved.decision.costs.cost(RiskTier::new(5).unwrap()),
            900.0
        );
        assert_eq!(resolved.decision.savings_rate, 0.1);
        assert_eq!(resolved.id_field, "member_id");
        assert_eq!(resolved.spending_field, "allowed_amount");
        assert_eq!(resolved.friendly_names["chf_flag"], "Heart failure");
        assert!(!resolved.explain);
    }

    #[test]
    fn test_reject_unknown_fields() {
        let json = r#"{"unknown_field": true}"#;
        let result: Result<CareScoreConfig, _> = serde_json::from_str(json);
        assert!(result.is_err(), "unknown fields should be rejected");
    }

    #[test]
    fn test_reject_unknown_magnitude_policy() {
        let json = r#"{"magnitude": "manhattan"}"#;
        let result: Result<CareScoreConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_unordered_thresholds() {
        let json = r#"{"tier_thresholds": {"tier3": 4.0}}"#;
        let config: CareScoreConfig = serde_json::from_str(json).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tier_thresholds.tier2"));
    }

    #[test]
    fn test_reject_threshold_above_scale() {
        let json = r#"{"scale": 10.0}"#;
        let config: CareScoreConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{"scale": 10.0, "tier_thresholds": {"tier2": 2, "tier3": 4, "tier4": 6, "tier5": 8}}"#;
        let config: CareScoreConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_reject_non_positive_scale_and_epsilon() {
        for json in [r#"{"scale": 0}"#, r#"{"epsilon": -1e-6}"#] {
            let config: CareScoreConfig = serde_json::from_str(json).unwrap();
            assert!(config.validate().is_err(), "{} should be rejected", json);
        }
    }

    #[test]
    fn test_reject_top_k_and_precision_out_of_range() {
        for json in [r#"{"top_k": 0}"#, r#"{"top_k": 51}"#, r#"{"precision": 7}"#] {
            let config: CareScoreConfig = serde_json::from_str(json).unwrap();
            assert!(config.validate().is_err(), "{} should be rejected", json);
        }
    }

    #[test]
    fn test_reject_bad_intervention_costs() {
        let json = r#"{"intervention_costs": {"2": -5}}"#;
        let config: CareScoreConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{"intervention_costs": {"4": 200}}"#;
        let config: CareScoreConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err(), "tier 4 cheaper than tier 3");
    }

    #[test]
    fn test_reject_savings_rate_out_of_range() {
        for json in [r#"{"savings_rate": 0}"#, r#"{"savings_rate": 1.5}"#] {
            let config: CareScoreConfig = serde_json::from_str(json).unwrap();
            assert!(config.validate().is_err(), "{} should be rejected", json);
        }
    }

    #[test]
    fn test_reject_empty_field_names() {
        let json = r#"{"spending_field": "  "}"#;
        let config: CareScoreConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_costs_use_defaults_for_rest() {
        let json = r#"{"intervention_costs": {"5": 2000}}"#;
        let config: CareScoreConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(
            resolved.decision.costs.as_array(),
            [0.0, 100.0, 300.0, 500.0, 2000.0]
        );
    }

    #[test]
    fn test_discover_carescorerc() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".carescorerc.json");
        fs::write(&config_path, r#"{"top_k": 7}"#).unwrap();

        let result = discover_config(dir.path()).unwrap();
        assert!(result.is_some());
        let (config, path) = result.unwrap();
        assert_eq!(config.top_k, Some(7));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_carescore_config_json() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("carescore.config.json");
        fs::write(&config_path, r#"{"precision": 1}"#).unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.precision, Some(1));
    }

    #[test]
    fn test_discover_priority_order() {
        let dir = tempfile::tempdir().unwrap();

        fs::write(dir.path().join(".carescorerc.json"), r#"{"top_k": 1}"#).unwrap();
        fs::write(dir.path().join("carescore.config.json"), r#"{"top_k": 2}"#).unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(
            config.top_k,
            Some(1),
            ".carescorerc.json should take priority"
        );
    }

    #[test]
    fn test_discover_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".carescorerc.json"), r#"{"top_k": 0}"#).unwrap();
        let err = discover_config(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(".carescorerc.json"));
    }

    #[test]
    fn test_no_config_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover_config(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_and_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(resolved.config_path.is_none());
        assert_eq!(resolved.top_k, 5);
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".carescorerc.json"), r#"{"top_k": 1}"#).unwrap();
        let config_path = dir.path().join("custom.json");
        fs::write(&config_path, r#"{"top_k": 9}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&config_path)).unwrap();
        assert_eq!(resolved.top_k, 9);
        assert_eq!(resolved.config_path, Some(config_path));
    }
}
