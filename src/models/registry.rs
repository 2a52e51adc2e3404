//! Model registry: the predictor and its companion artifacts, loaded once.
//!
//! Loading never fails outright. Any missing or inconsistent artifact puts
//! the registry into `RegistryState::Unavailable`, which every prediction
//! path checks before doing work. The registry is immutable after loading
//! and is shared by reference across requests.

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::ModelsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::explainer::{Explainer, PersistedExplainer, TreeExplainer};
use crate::models::loader::{ModelArtifacts, ModelLoader};
use crate::models::predictor::Regressor;
use crate::models::tree::TreeEnsemble;
use crate::types::scenario::{FeatureStatistics, PerformanceMetrics};

/// A fully loaded registry
pub struct LoadedRegistry {
    pub predictor: Arc<dyn Regressor>,
    /// Feature names in the predictor's column order
    pub feature_names: Vec<String>,
    pub feature_stats: FeatureStatistics,
    pub performance: PerformanceMetrics,
    /// Attribution engine; `None` when no explainer could be built
    pub explainer: Option<Arc<dyn Explainer>>,
    /// Why `explainer` is `None`
    pub explainer_unavailable: Option<String>,
}

pub enum RegistryState {
    Ready(LoadedRegistry),
    Unavailable { reason: String },
}

pub struct ModelRegistry {
    state: RegistryState,
}

impl ModelRegistry {
    /// Load every artifact from the configured directory.
    ///
    /// Failures are logged and produce an unavailable registry.
    pub fn load(config: &ModelsConfig) -> Self {
        let loader = ModelLoader::new(config);
        let artifacts = match loader.load_artifacts() {
            Ok(artifacts) => artifacts,
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(models_dir = %loader.models_dir().display(), error = %reason, "Failed to load model artifacts");
                return Self::unavailable(reason);
            }
        };

        match Self::from_artifacts(artifacts, loader.load_persisted_explainer()) {
            Ok(registry) => registry,
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(error = %reason, "Model artifacts are inconsistent");
                Self::unavailable(reason)
            }
        }
    }

    /// Validate loaded artifacts and build the attribution engine.
    ///
    /// A persisted explainer is preferred when it matches the model;
    /// otherwise a fresh one is derived from the tree ensemble.
    pub fn from_artifacts(
        artifacts: ModelArtifacts,
        persisted: Option<PersistedExplainer>,
    ) -> Result<Self> {
        validate_schema(&artifacts)?;

        let ModelArtifacts {
            model,
            feature_names,
            feature_stats,
            performance,
        } = artifacts;
        let model = Arc::new(model);

        let (explainer, explainer_unavailable) = match build_explainer(model.clone(), persisted) {
            Ok(explainer) => (Some(Arc::new(explainer) as Arc<dyn Explainer>), None),
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(error = %reason, "SHAP explainer unavailable; serving predictions without explanations");
                (None, Some(reason))
            }
        };

        info!(
            features = feature_names.len(),
            explainer = explainer.is_some(),
            "Model registry ready"
        );

        Ok(Self {
            state: RegistryState::Ready(LoadedRegistry {
                predictor: model,
                feature_names,
                feature_stats,
                performance,
                explainer,
                explainer_unavailable,
            }),
        })
    }

    /// Assemble a registry from already constructed parts
    pub fn from_parts(
        predictor: Arc<dyn Regressor>,
        feature_names: Vec<String>,
        feature_stats: FeatureStatistics,
        performance: PerformanceMetrics,
        explainer: Option<Arc<dyn Explainer>>,
    ) -> Self {
        let explainer_unavailable = explainer
            .is_none()
            .then(|| "no explainer configured".to_string());
        Self {
            state: RegistryState::Ready(LoadedRegistry {
                predictor,
                feature_names,
                feature_stats,
                performance,
                explainer,
                explainer_unavailable,
            }),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: RegistryState::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, RegistryState::Ready(_))
    }

    /// The loaded registry, or `RegistryUnavailable`
    pub fn ready(&self) -> PipelineResult<&LoadedRegistry> {
        match &self.state {
            RegistryState::Ready(loaded) => Ok(loaded),
            RegistryState::Unavailable { reason } => Err(PipelineError::RegistryUnavailable {
                reason: reason.clone(),
            }),
        }
    }
}

fn validate_schema(artifacts: &ModelArtifacts) -> Result<()> {
    let names = &artifacts.feature_names;
    if names.is_empty() {
        bail!("feature name list is empty");
    }

    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            bail!("duplicate feature name '{}'", name);
        }
    }

    if artifacts.model.num_features() != names.len() {
        bail!(
            "model expects {} features but the feature list has {}",
            artifacts.model.num_features(),
            names.len()
        );
    }

    let embedded = artifacts.model.feature_names();
    if !embedded.is_empty() && embedded != names.as_slice() {
        bail!("feature names embedded in the model differ from the feature list");
    }

    let missing = artifacts.feature_stats.missing_features(names);
    if !missing.is_empty() {
        bail!("feature statistics missing for: {}", missing.join(", "));
    }

    Ok(())
}

fn build_explainer(
    model: Arc<TreeEnsemble>,
    persisted: Option<PersistedExplainer>,
) -> Result<TreeExplainer> {
    if let Some(persisted) = persisted {
        match TreeExplainer::from_persisted(model.clone(), &persisted) {
            Ok(explainer) => {
                info!("Loaded persisted SHAP explainer");
                return Ok(explainer);
            }
            Err(e) => {
                warn!(error = %e, "Persisted explainer incompatible with model, creating a new one");
            }
        }
    }
    info!("Creating SHAP explainer from model");
    TreeExplainer::new(model)
}
