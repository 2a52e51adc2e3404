//! Scenario inference: prediction, derived metrics and attribution

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{AppConfig, BatchConfig, CalibrationConfig, ExplanationConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::feature_extractor::FeatureExtractor;
use crate::models::batch::BatchPredictor;
use crate::models::ranking::{build_charts, top_contributions};
use crate::models::registry::{LoadedRegistry, ModelRegistry};
use crate::types::batch::{BatchResult, BatchTable};
use crate::types::prediction::{AttributionResult, Explanation, PredictionResult, ScenarioOutcome};
use crate::types::scenario::FeatureVector;

/// Runs single-scenario and batch predictions against a shared registry.
pub struct InferenceEngine {
    registry: Arc<ModelRegistry>,
    calibration: CalibrationConfig,
    explanation: ExplanationConfig,
    batch: BatchConfig,
}

impl InferenceEngine {
    pub fn new(registry: Arc<ModelRegistry>, config: &AppConfig) -> Self {
        Self {
            registry,
            calibration: config.calibration.clone(),
            explanation: config.explanation.clone(),
            batch: config.batch.clone(),
        }
    }

    /// Engine with default calibration, ranking and batch settings
    pub fn with_defaults(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            calibration: CalibrationConfig::default(),
            explanation: ExplanationConfig::default(),
            batch: BatchConfig::default(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn calibration(&self) -> &CalibrationConfig {
        &self.calibration
    }

    /// Predict one scenario and explain it.
    ///
    /// Only the prediction can fail the request. When attribution fails the
    /// outcome carries no explanation and `explanation_note` says why.
    pub fn predict_one(&self, features: &FeatureVector) -> PipelineResult<ScenarioOutcome> {
        let loaded = self.registry.ready()?;

        let extractor = FeatureExtractor::new(loaded.feature_names.clone());
        let row = extractor.extract(features)?;

        let point_estimate = loaded
            .predictor
            .predict_row(&row)
            .map_err(|e| PipelineError::Prediction {
                stage: "model inference",
                message: format!("{:#}", e),
            })?;
        let prediction = PredictionResult::new(point_estimate, &self.calibration);

        debug!(
            prediction = point_estimate,
            delta_pct = prediction.derived.delta_pct,
            "Scenario predicted"
        );

        let (explanation, explanation_note) = match self.explain(loaded, row) {
            Ok(explanation) => (Some(explanation), None),
            Err(e) => {
                warn!(error = %e, "Prediction served without explanation");
                (None, Some(e.to_string()))
            }
        };

        Ok(ScenarioOutcome {
            prediction,
            explanation,
            explanation_note,
        })
    }

    /// Predict every row of a table
    pub fn predict_batch(&self, table: &BatchTable) -> PipelineResult<BatchResult> {
        let loaded = self.registry.ready()?;
        BatchPredictor::new(loaded, &self.batch.prediction_column).predict(table)
    }

    fn explain(&self, loaded: &LoadedRegistry, row: Vec<f64>) -> PipelineResult<Explanation> {
        let Some(explainer) = &loaded.explainer else {
            let reason = loaded
                .explainer_unavailable
                .clone()
                .unwrap_or_else(|| "no explainer loaded".to_string());
            return Err(PipelineError::AttributionUnavailable(reason));
        };

        let mut values = explainer
            .explain(&[row])
            .map_err(|e| PipelineError::AttributionUnavailable(format!("{:#}", e)))?;
        let values = values.pop().ok_or_else(|| {
            PipelineError::AttributionUnavailable("explainer returned no rows".to_string())
        })?;
        if values.len() != loaded.feature_names.len() {
            return Err(PipelineError::AttributionUnavailable(format!(
                "explainer returned {} values for {} features",
                values.len(),
                loaded.feature_names.len()
            )));
        }

        let top = top_contributions(&loaded.feature_names, &values, self.explanation.top_k);
        let charts = build_charts(&top, &self.explanation);

        Ok(Explanation {
            attribution: AttributionResult {
                base_value: explainer.expected_value(),
                contribution_sum: values.iter().sum(),
                top,
            },
            charts,
        })
    }
}
