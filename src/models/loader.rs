//! Model artifact loader

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::ModelsConfig;
use crate::models::explainer::PersistedExplainer;
use crate::models::tree::TreeEnsemble;
use crate::types::scenario::{FeatureStatistics, PerformanceMetrics};

/// Everything needed to serve predictions, as read from disk
pub struct ModelArtifacts {
    pub model: TreeEnsemble,
    pub feature_names: Vec<String>,
    pub feature_stats: FeatureStatistics,
    pub performance: PerformanceMetrics,
}

/// Loader for the model directory
pub struct ModelLoader {
    models_dir: PathBuf,
    config: ModelsConfig,
}

impl ModelLoader {
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            models_dir: PathBuf::from(&config.models_dir),
            config: config.clone(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Load the four required artifacts
    pub fn load_artifacts(&self) -> Result<ModelArtifacts> {
        info!(models_dir = %self.models_dir.display(), "Loading model artifacts");

        let model_path = self.models_dir.join(&self.config.model_file);
        let model = TreeEnsemble::from_path(&model_path)
            .with_context(|| format!("Failed to load predictor {}", model_path.display()))?;

        let feature_names: Vec<String> = self.load_json(&self.config.feature_names_file)?;
        let feature_stats: FeatureStatistics = self.load_json(&self.config.feature_stats_file)?;
        let performance: PerformanceMetrics =
            self.load_json(&self.config.performance_metrics_file)?;

        info!(
            trees = model.trees().len(),
            features = feature_names.len(),
            fingerprint = %model.fingerprint(),
            "Model artifacts loaded"
        );

        Ok(ModelArtifacts {
            model,
            feature_names,
            feature_stats,
            performance,
        })
    }

    /// Load the optional persisted explainer.
    ///
    /// Returns `None` when the file is absent or unreadable.
    pub fn load_persisted_explainer(&self) -> Option<PersistedExplainer> {
        let path = self.models_dir.join(&self.config.explainer_file);
        if !path.exists() {
            info!(path = %path.display(), "No persisted explainer found");
            return None;
        }
        match PersistedExplainer::load(&path) {
            Ok(explainer) => Some(explainer),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{:#}", e),
                    "Ignoring unreadable persisted explainer"
                );
                None
            }
        }
    }

    fn load_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T> {
        let path = self.models_dir.join(file_name);
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_config() -> ModelsConfig {
        ModelsConfig::in_dir(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/models"))
    }

    #[test]
    fn test_load_fixture_artifacts() {
        let loader = ModelLoader::new(&fixture_config());
        let artifacts = loader.load_artifacts().unwrap();
        assert_eq!(artifacts.feature_names.len(), 18);
        assert_eq!(artifacts.feature_names[13], "C/N Ratio");
        assert_eq!(artifacts.performance.r2, 0.9887);
        assert_eq!(artifacts.feature_stats.means["Water (L)"], 99.96);
        assert!(loader.load_persisted_explainer().is_none());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let loader = ModelLoader::new(&ModelsConfig::in_dir("/nonexistent/models"));
        let err = loader.load_artifacts().err().unwrap();
        assert!(format!("{:#}", err).contains("model.json"));
    }

    #[test]
    fn test_corrupt_explainer_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shap_explainer.json"), b"not json").unwrap();
        let loader = ModelLoader::new(&ModelsConfig::in_dir(dir.path()));
        assert!(loader.load_persisted_explainer().is_none());
    }
}
