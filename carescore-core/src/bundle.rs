//! Model bundle loading
//!
//! A model directory holds a `manifest.json` naming one k-means artifact per
//! horizon plus an optional attribution model and scaler:
//!
//! ```json
//! {
//!   "clusters": {"30-day": "kmeans_30d.json", "60-day": "kmeans_60d.json", "90-day": "kmeans_90d.json"},
//!   "attribution": "attribution.json",
//!   "scaler": "scaler.json"
//! }
//! ```
//!
//! Global invariants enforced:
//! - A bundle is fully validated before it can be constructed
//! - A bundle is immutable; share it with `Arc` across scoring threads

use crate::attribution::AttributionEngine;
use crate::horizon::{Horizon, PerHorizon};
use crate::model::{
    ClusterModel, KMeansArtifact, KMeansModel, LinearExplainer, LinearExplainerArtifact,
    ScalerArtifact, StandardScaler,
};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manifest file name inside a model directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// On-disk description of a model directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Horizon label to cluster artifact path (relative to the manifest)
    pub clusters: BTreeMap<String, PathBuf>,

    #[serde(default)]
    pub attribution: Option<PathBuf>,

    #[serde(default)]
    pub scaler: Option<PathBuf>,
}

impl Manifest {
    /// Map manifest keys onto horizons, requiring exactly one entry per horizon
    fn cluster_paths(&self) -> Result<PerHorizon<PathBuf>> {
        let mut found: [Option<PathBuf>; 3] = [None, None, None];
        for (label, path) in &self.clusters {
            let horizon = Horizon::parse(label)
                .with_context(|| format!("unknown horizon in manifest: {}", label))?;
            if found[horizon.index()].replace(path.clone()).is_some() {
                anyhow::bail!("horizon {} listed more than once in manifest", horizon);
            }
        }

        PerHorizon::try_from_fn(|horizon| {
            found[horizon.index()]
                .clone()
                .with_context(|| format!("manifest has no cluster model for {}", horizon))
        })
    }
}

/// Every pre-trained model the engine needs, loaded once per process
pub struct ModelBundle {
    clusters: PerHorizon<Box<dyn ClusterModel>>,
    attribution: Option<AttributionEngine>,
    source: Option<PathBuf>,
}

impl ModelBundle {
    /// Assemble a bundle from in-memory models
    pub fn new(
        clusters: PerHorizon<Box<dyn ClusterModel>>,
        attribution: Option<AttributionEngine>,
    ) -> Self {
        ModelBundle {
            clusters,
            attribution,
            source: None,
        }
    }

    /// Load and validate every artifact named by `dir/manifest.json`
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest: Manifest = read_json(&manifest_path)?;
        let cluster_paths = manifest.cluster_paths()?;

        let clusters = PerHorizon::try_from_fn(|horizon| -> Result<Box<dyn ClusterModel>> {
            let path = dir.join(&cluster_paths[horizon]);
            let artifact: KMeansArtifact = read_json(&path)?;
            let model = KMeansModel::from_artifact(artifact)
                .with_context(|| format!("invalid {} cluster model: {}", horizon, path.display()))?;
            tracing::debug!(
                horizon = %horizon,
                features = model.feature_names().len(),
                clusters = model.cluster_centers().len(),
                "loaded cluster model"
            );
            Ok(Box::new(model))
        })?;

        let scaler = match &manifest.scaler {
            Some(relative) => {
                let path = dir.join(relative);
                let artifact: ScalerArtifact = read_json(&path)?;
                Some(
                    StandardScaler::from_artifact(artifact)
                        .with_context(|| format!("invalid scaler: {}", path.display()))?,
                )
            }
            None => None,
        };

        let attribution = match &manifest.attribution {
            Some(relative) => {
                let path = dir.join(relative);
                let artifact: LinearExplainerArtifact = read_json(&path)?;
                let explainer = LinearExplainer::from_artifact(artifact)
                    .with_context(|| format!("invalid attribution model: {}", path.display()))?;
                let engine = AttributionEngine::new(Box::new(explainer), scaler)
                    .with_context(|| format!("invalid attribution model: {}", path.display()))?;
                Some(engine)
            }
            None => {
                if scaler.is_some() {
                    tracing::warn!("manifest lists a scaler without an attribution model; ignoring it");
                }
                None
            }
        };

        tracing::info!(
            dir = %dir.display(),
            attribution = attribution.is_some(),
            "model bundle ready"
        );

        Ok(ModelBundle {
            clusters,
            attribution,
            source: Some(dir.to_path_buf()),
        })
    }

    pub fn cluster_model(&self, horizon: Horizon) -> &dyn ClusterModel {
        self.clusters[horizon].as_ref()
    }

    pub fn attribution(&self) -> Option<&AttributionEngine> {
        self.attribution.as_ref()
    }

    /// Directory the bundle was loaded from (None for in-memory bundles)
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// One line per model, for diagnostics
    pub fn describe(&self) -> Vec<String> {
        let mut lines: Vec<String> = Horizon::ALL
            .iter()
            .map(|&h| {
                let model = self.cluster_model(h);
                format!(
                    "{}: {} features, {} clusters",
                    h,
                    model.feature_names().len(),
                    model.cluster_centers().len()
                )
            })
            .collect();
        match &self.attribution {
            Some(engine) => lines.push(format!(
                "attribution: {} features, base value {}{}",
                engine.feature_names().len(),
                engine.base_value(),
                if engine.has_scaler() { ", scaled" } else { "" }
            )),
            None => lines.push("attribution: none".to_string()),
        }
        lines
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read model artifact: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse model artifact: {}", path.display()))
}
