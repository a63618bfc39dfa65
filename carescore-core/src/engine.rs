//! Risk engine: the per-member pipeline
//!
//! project -> cluster score (x3) -> normalize & tier -> attribution ->
//! narrative -> intervention decision -> report
//!
//! Global invariants enforced:
//! - Scoring is synchronous and stateless; the engine only reads its bundle
//! - One horizon failing never aborts the others
//! - Batch output order equals input order

use crate::attribution::AttributionVector;
use crate::bundle::ModelBundle;
use crate::config::ResolvedConfig;
use crate::decision::{decide, extract_spending};
use crate::error::{AttributionError, EngineError};
use crate::horizon::Horizon;
use crate::member::MemberRecord;
use crate::narrative::NarrativeBuilder;
use crate::report::{assemble, Explanation, ReportParts, RiskReport};
use crate::risk::stratify;
use crate::scoring::score_all;
use rayon::prelude::*;
use std::sync::Arc;

/// Per-call overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOptions {
    /// Run attribution and build the narrative
    pub explain: bool,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        ScoreOptions { explain: true }
    }
}

/// Scores members against a loaded model bundle
pub struct RiskEngine {
    bundle: Arc<ModelBundle>,
    config: ResolvedConfig,
    narrator: NarrativeBuilder,
}

impl RiskEngine {
    pub fn new(bundle: Arc<ModelBundle>, config: ResolvedConfig) -> Self {
        let narrator = NarrativeBuilder::new(config.top_k, config.precision)
            .with_friendly_names(&config.friendly_names);
        RiskEngine {
            bundle,
            config,
            narrator,
        }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Options implied by the configuration
    pub fn default_options(&self) -> ScoreOptions {
        ScoreOptions {
            explain: self.config.explain,
        }
    }

    pub fn score(&self, record: &MemberRecord) -> Result<RiskReport, EngineError> {
        self.score_with(record, self.default_options())
    }

    pub fn score_with(
        &self,
        record: &MemberRecord,
        options: ScoreOptions,
    ) -> Result<RiskReport, EngineError> {
        let horizons = score_all(|h| self.bundle.cluster_model(h), record, self.config.magnitude);

        if horizons.iter().all(|(_, r)| r.is_err()) {
            return Err(EngineError::AllHorizonsFailed {
                member_id: record.id.clone(),
                failures: horizons
                    .iter()
                    .filter_map(|(h, r)| r.as_ref().err().map(|e| (h, e.clone())))
                    .collect(),
            });
        }

        let raw = horizons.map(|_, r| r.as_ref().ok().map(|s| s.magnitude));
        let risk = stratify(&raw, &self.config.normalization, &self.config.thresholds);

        let explanation = if options.explain {
            self.explain(record)
        } else {
            Explanation::Skipped
        };

        let (spending, spending_issue) = extract_spending(record, &self.config.spending_field);
        if let Some(issue) = &spending_issue {
            tracing::debug!(member_id = %record.id, "{}", issue);
        }
        let intervention = risk[Horizon::PRIMARY]
            .map(|primary| decide(primary.score, primary.tier, spending, &self.config.decision));

        let report = assemble(ReportParts {
            member_id: record.id.clone(),
            horizons,
            risk,
            explanation,
            intervention,
            spending_issue,
        });

        if report.degraded {
            tracing::warn!(
                member_id = %report.member_id,
                issues = report.issues.len(),
                "report degraded"
            );
        }
        Ok(report)
    }

    /// Raw attribution vector for the primary horizon
    pub fn attribute(&self, record: &MemberRecord) -> Result<AttributionVector, AttributionError> {
        match self.bundle.attribution() {
            Some(engine) => engine.explain(record),
            None => Err(AttributionError::NoModel),
        }
    }

    fn explain(&self, record: &MemberRecord) -> Explanation {
        match self.attribute(record) {
            Ok(vector) => {
                tracing::debug!(
                    member_id = %record.id,
                    features = vector.len(),
                    "attribution computed"
                );
                Explanation::Available(self.narrator.build(&vector, record, Horizon::PRIMARY))
            }
            Err(err) => {
                tracing::warn!(member_id = %record.id, error = %err, "attribution unavailable");
                Explanation::Unavailable {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Score many members in parallel; results keep input order
    pub fn score_batch(
        &self,
        records: &[MemberRecord],
        options: ScoreOptions,
    ) -> Vec<Result<RiskReport, EngineError>> {
        self.score_batch_with_progress(records, options, || {})
    }

    /// [`RiskEngine::score_batch`], calling `on_scored` once per finished member
    pub fn score_batch_with_progress(
        &self,
        records: &[MemberRecord],
        options: ScoreOptions,
        on_scored: impl Fn() + Sync + Send,
    ) -> Vec<Result<RiskReport, EngineError>> {
        records
            .par_iter()
            .map(|record| {
                let result = self.score_with(record, options);
                on_scored();
                result
            })
            .collect()
    }
}
