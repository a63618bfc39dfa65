//! Risk report assembly and output generation
//!
//! Global invariants enforced:
//! - A horizon that failed is reported as `"unavailable"`, never as zero
//! - Every recoverable problem is listed in `issues`
//! - Deterministic output ordering; byte-for-byte identical output across runs

use crate::decision::{InterventionDecision, SpendingIssue};
use crate::error::ScoringError;
use crate::horizon::{Horizon, PerHorizon};
use crate::narrative::Narrative;
use crate::risk::{HorizonRisk, RiskTier};
use crate::scoring::HorizonScore;
use serde::{Serialize, Serializer};
use std::fmt::Write as _;

/// Sentinel written in place of a value that could not be computed
pub const UNAVAILABLE: &str = "unavailable";

/// A report value that may be missing; serializes as the value or `"unavailable"`
#[derive(Debug, Clone, PartialEq)]
pub enum Availability<T> {
    Available(T),
    Unavailable,
}

impl<T> Availability<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Availability::Available(v) => Some(v),
            Availability::Unavailable => None,
        }
    }
}

impl<T> From<Option<T>> for Availability<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Availability::Available(v),
            None => Availability::Unavailable,
        }
    }
}

impl<T: Serialize> Serialize for Availability<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Availability::Available(v) => v.serialize(serializer),
            Availability::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    MissingFeature,
    Scoring,
    Attribution,
    DecisionInput,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MissingFeature => "missing-feature",
            IssueKind::Scoring => "scoring",
            IssueKind::Attribution => "attribution",
            IssueKind::DecisionInput => "decision-input",
        }
    }
}

/// A recoverable problem met while building one report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportIssue {
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon: Option<Horizon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    pub message: String,
}

/// Attribution outcome for the primary horizon
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Explanation {
    Available(Narrative),
    /// The attribution step failed or no attribution model is loaded
    Unavailable { reason: String },
    /// The caller asked for no attribution
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierEntry {
    pub horizon: Horizon,
    pub tier: RiskTier,
}

/// Complete risk report for one member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub member_id: String,
    /// Cluster assigned at the primary horizon
    pub cluster: Availability<usize>,
    pub risk_scores: PerHorizon<Availability<f64>>,
    pub risk_tiers: PerHorizon<Availability<RiskTier>>,
    /// Available horizons by ascending tier, ties in window order
    pub sorted_tiers: Vec<TierEntry>,
    pub highest_risk_window: Option<Horizon>,
    pub lowest_risk_window: Option<Horizon>,
    pub narratives: PerHorizon<&'static str>,
    pub explanation: Explanation,
    pub intervention: Availability<InterventionDecision>,
    /// True when any part of the report is unavailable
    pub degraded: bool,
    pub issues: Vec<ReportIssue>,
}

impl RiskReport {
    pub fn score(&self, horizon: Horizon) -> Option<f64> {
        self.risk_scores[horizon].as_option().copied()
    }

    pub fn tier(&self, horizon: Horizon) -> Option<RiskTier> {
        self.risk_tiers[horizon].as_option().copied()
    }
}

/// Stage outputs for one member, ready to be composed into a report
pub struct ReportParts {
    pub member_id: String,
    pub horizons: PerHorizon<Result<HorizonScore, ScoringError>>,
    pub risk: PerHorizon<Option<HorizonRisk>>,
    pub explanation: Explanation,
    pub intervention: Option<InterventionDecision>,
    pub spending_issue: Option<SpendingIssue>,
}

/// Compose stage outputs into a report; pure
pub fn assemble(parts: ReportParts) -> RiskReport {
    let mut issues = Vec::new();
    for (horizon, outcome) in parts.horizons.iter() {
        match outcome {
            Ok(score) => issues.extend(score.missing.iter().map(|feature| ReportIssue {
                kind: IssueKind::MissingFeature,
                horizon: Some(horizon),
                feature: Some(feature.clone()),
                message: format!("{} is absent; scored as 0", feature),
            })),
            Err(err) => issues.push(ReportIssue {
                kind: IssueKind::Scoring,
                horizon: Some(horizon),
                feature: None,
                message: err.to_string(),
            }),
        }
    }
    if let Explanation::Unavailable { reason } = &parts.explanation {
        issues.push(ReportIssue {
            kind: IssueKind::Attribution,
            horizon: Some(Horizon::PRIMARY),
            feature: None,
            message: reason.clone(),
        });
    }
    if let Some(issue) = &parts.spending_issue {
        issues.push(ReportIssue {
            kind: IssueKind::DecisionInput,
            horizon: None,
            feature: None,
            message: issue.to_string(),
        });
    }

    let tiers = parts.risk.map(|_, r| r.map(|r| r.tier));
    let mut sorted_tiers: Vec<TierEntry> = tiers
        .iter()
        .filter_map(|(horizon, tier)| tier.map(|tier| TierEntry { horizon, tier }))
        .collect();
    sorted_tiers.sort_by_key(|entry| entry.tier);

    let degraded = parts.horizons.iter().any(|(_, r)| r.is_err())
        || matches!(parts.explanation, Explanation::Unavailable { .. });

    RiskReport {
        cluster: parts.horizons[Horizon::PRIMARY]
            .as_ref()
            .ok()
            .map(|s| s.cluster_id)
            .into(),
        risk_scores: parts.risk.map(|_, r| Availability::from(r.map(|r| r.score))),
        risk_tiers: tiers.map(|_, t| Availability::from(*t)),
        highest_risk_window: extreme_window(&tiers, |candidate, best| candidate > best),
        lowest_risk_window: extreme_window(&tiers, |candidate, best| candidate < best),
        sorted_tiers,
        narratives: PerHorizon::from_fn(|h| h.narrative()),
        explanation: parts.explanation,
        intervention: parts.intervention.into(),
        degraded,
        issues,
        member_id: parts.member_id,
    }
}

/// First horizon (in window order) whose tier beats every earlier one
fn extreme_window(
    tiers: &PerHorizon<Option<RiskTier>>,
    beats: impl Fn(RiskTier, RiskTier) -> bool,
) -> Option<Horizon> {
    let mut best: Option<(Horizon, RiskTier)> = None;
    for (horizon, tier) in tiers.iter() {
        if let Some(tier) = *tier {
            match best {
                Some((_, current)) if !beats(tier, current) => {}
                _ => best = Some((horizon, tier)),
            }
        }
    }
    best.map(|(horizon, _)| horizon)
}

/// Sort reports by primary-horizon risk
pub fn sort_reports(mut reports: Vec<RiskReport>) -> Vec<RiskReport> {
    reports.sort_by(|a, b| {
        // 1. Primary tier descending, unavailable last
        b.tier(Horizon::PRIMARY)
            .cmp(&a.tier(Horizon::PRIMARY))
            // 2. Primary score descending
            .then_with(|| {
                let sa = a.score(Horizon::PRIMARY).unwrap_or(f64::NEG_INFINITY);
                let sb = b.score(Horizon::PRIMARY).unwrap_or(f64::NEG_INFINITY);
                sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
            })
            // 3. Member id ascending
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
    reports
}

/// Render reports as JSON output
pub fn render_json(reports: &[RiskReport]) -> String {
    serde_json::to_string_pretty(reports).unwrap_or_else(|_| "[]".to_string())
}

/// Render reports as JSON Lines, one report per line
pub fn render_jsonl(reports: &[RiskReport]) -> serde_json::Result<String> {
    let mut output = String::new();
    for report in reports {
        output.push_str(&serde_json::to_string(report)?);
        output.push('\n');
    }
    Ok(output)
}

/// Render reports as text output
pub fn render_text(reports: &[RiskReport]) -> String {
    let mut output = String::new();
    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        render_one(&mut output, report);
    }
    output
}

fn render_one(out: &mut String, report: &RiskReport) {
    let cluster = match report.cluster.as_option() {
        Some(id) => id.to_string(),
        None => UNAVAILABLE.to_string(),
    };
    let _ = writeln!(
        out,
        "Member {}  (cluster {}){}",
        report.member_id,
        cluster,
        if report.degraded { "  [degraded]" } else { "" }
    );
    let _ = writeln!(out, "  {:<8} {:<7} {:<5} {}", "WINDOW", "SCORE", "TIER", "NARRATIVE");
    for horizon in Horizon::ALL {
        let score = match report.score(horizon) {
            Some(s) => format!("{:.2}", s),
            None => "-".to_string(),
        };
        let tier = match report.tier(horizon) {
            Some(t) => t.to_string(),
            None => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "  {:<8} {:<7} {:<5} {}",
            horizon.as_str(),
            score,
            tier,
            report.narratives[horizon]
        );
    }

    if let (Some(high), Some(low)) = (report.highest_risk_window, report.lowest_risk_window) {
        let _ = writeln!(out, "  Highest risk: {}   Lowest risk: {}", high, low);
    }

    match &report.explanation {
        Explanation::Available(narrative) if narrative.phrases.is_empty() => {
            let _ = writeln!(out, "  Drivers: none");
        }
        Explanation::Available(narrative) => {
            let _ = writeln!(out, "  Drivers:");
            for phrase in &narrative.phrases {
                let _ = writeln!(out, "    - {}", phrase);
            }
        }
        Explanation::Unavailable { reason } => {
            let _ = writeln!(out, "  Drivers: unavailable ({})", reason);
        }
        Explanation::Skipped => {}
    }

    match report.intervention.as_option() {
        Some(decision) => {
            let _ = writeln!(
                out,
                "  Intervention: {} (expected savings {:.0})",
                decision.recommended_action, decision.expected_savings
            );
        }
        None => {
            let _ = writeln!(out, "  Intervention: {}", UNAVAILABLE);
        }
    }

    if !report.issues.is_empty() {
        let _ = writeln!(out, "  Issues:");
        for issue in &report.issues {
            let scope = match issue.horizon {
                Some(h) => format!(" {}", h),
                None => String::new(),
            };
            let _ = writeln!(out, "    [{}{}] {}", issue.kind.as_str(), scope, issue.message);
        }
    }
}
