//! carescore core library - member risk stratification over pre-trained cluster models

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Models are loaded and validated once, then shared read-only
// - No global mutable state
// - No randomness or clocks; scoring one member is synchronous
// - Failed stages are reported explicitly, never silently zeroed
// - Identical input yields byte-for-byte identical output

pub mod attribution;
pub mod bundle;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod horizon;
pub mod member;
pub mod model;
pub mod narrative;
pub mod projector;
pub mod report;
pub mod risk;
pub mod scoring;

pub use bundle::ModelBundle;
pub use config::ResolvedConfig;
pub use engine::{RiskEngine, ScoreOptions};
pub use error::EngineError;
pub use horizon::{Horizon, PerHorizon};
pub use member::{load_members, MemberRecord};
pub use report::{render_json, render_jsonl, render_text, sort_reports, RiskReport};

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Load a model bundle and build an engine around it
///
/// The bundle is fully validated before the engine exists, so a returned
/// engine is always ready to score.
pub fn load_engine(models_dir: &Path, config: ResolvedConfig) -> Result<RiskEngine> {
    let bundle = ModelBundle::load(models_dir)
        .with_context(|| format!("failed to load models from {}", models_dir.display()))?;
    Ok(RiskEngine::new(Arc::new(bundle), config))
}

/// Load members from `members_path` and score them all
pub fn score_file(
    members_path: &Path,
    engine: &RiskEngine,
    options: ScoreOptions,
) -> Result<Vec<std::result::Result<RiskReport, EngineError>>> {
    let members = load_members(members_path, &engine.config().id_field)?;
    tracing::info!(members = members.len(), "scoring members");
    Ok(engine.score_batch(&members, options))
}
