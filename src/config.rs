//! Configuration management for the biogas prediction service

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides the default configuration path
pub const CONFIG_PATH_ENV: &str = "BIOGAS_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub explanation: ExplanationConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for single-scenario prediction requests
    pub predict_subject: String,
    /// Subject for CSV batch requests
    pub batch_subject: String,
}

/// Model artifact locations
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the serialized artifacts
    pub models_dir: String,
    /// LightGBM `dump_model()` JSON document
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_feature_names_file")]
    pub feature_names_file: String,
    #[serde(default = "default_feature_stats_file")]
    pub feature_stats_file: String,
    #[serde(default = "default_performance_metrics_file")]
    pub performance_metrics_file: String,
    /// Optional persisted SHAP explainer
    #[serde(default = "default_explainer_file")]
    pub explainer_file: String,
}

fn default_model_file() -> String {
    "model.json".to_string()
}

fn default_feature_names_file() -> String {
    "feature_names.json".to_string()
}

fn default_feature_stats_file() -> String {
    "feature_stats.json".to_string()
}

fn default_performance_metrics_file() -> String {
    "performance_metrics.json".to_string()
}

fn default_explainer_file() -> String {
    "shap_explainer.json".to_string()
}

impl ModelsConfig {
    /// Artifact configuration rooted at `models_dir` with the default file names.
    pub fn in_dir<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().display().to_string(),
            model_file: default_model_file(),
            feature_names_file: default_feature_names_file(),
            feature_stats_file: default_feature_stats_file(),
            performance_metrics_file: default_performance_metrics_file(),
            explainer_file: default_explainer_file(),
        }
    }
}

/// Domain calibration values taken from the training dataset.
///
/// The defaults reproduce the published figures: 6.5 kWh per m³ of biogas,
/// a facility average of 79.21 m³/day, and annual totals in thousand m³.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CalibrationConfig {
    pub energy_kwh_per_m3: f64,
    pub baseline_m3_per_day: f64,
    pub days_per_year: f64,
    pub annual_unit_divisor: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            energy_kwh_per_m3: 6.5,
            baseline_m3_per_day: 79.21,
            days_per_year: 365.0,
            annual_unit_divisor: 1000.0,
        }
    }
}

/// Attribution ranking and chart configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExplanationConfig {
    /// Number of features kept in the ranked attribution
    pub top_k: usize,
    /// Bar color for contributions that push the prediction up
    pub positive_color: String,
    /// Bar color for contributions that push the prediction down
    pub negative_color: String,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            positive_color: "#2E7D32".to_string(),
            negative_color: "#C62828".to_string(),
        }
    }
}

/// Batch prediction output configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BatchConfig {
    /// Name of the column appended to the input table
    pub prediction_column: String,
    /// Default output path for the offline batch tool
    pub output_file: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            prediction_column: "Predicted_Biogas_m3".to_string(),
            output_file: "biogas_predictions.csv".to_string(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of requests processed concurrently
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `BIOGAS_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                predict_subject: "biogas.predict".to_string(),
                batch_subject: "biogas.batch".to_string(),
            },
            models: ModelsConfig::in_dir("models"),
            calibration: CalibrationConfig::default(),
            explanation: ExplanationConfig::default(),
            batch: BatchConfig::default(),
            pipeline: PipelineConfig { workers: 4 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.calibration.energy_kwh_per_m3, 6.5);
        assert_eq!(config.calibration.baseline_m3_per_day, 79.21);
        assert_eq!(config.explanation.top_k, 10);
        assert_eq!(config.models.model_file, "model.json");
    }

    #[test]
    fn test_load_from_path_fills_section_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[nats]
url = "nats://nats:4222"
predict_subject = "p"
batch_subject = "b"

[models]
models_dir = "/srv/models"

[pipeline]
workers = 2

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.url, "nats://nats:4222");
        assert_eq!(config.models.models_dir, "/srv/models");
        assert_eq!(config.models.explainer_file, "shap_explainer.json");
        assert_eq!(config.calibration, CalibrationConfig::default());
        assert_eq!(config.batch.prediction_column, "Predicted_Biogas_m3");
        assert_eq!(config.pipeline.workers, 2);
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.toml");
        let config = AppConfig::load_from_path(path).unwrap();
        assert_eq!(config.nats.predict_subject, "biogas.predict");
        assert_eq!(config.calibration, CalibrationConfig::default());
        assert_eq!(config.explanation, ExplanationConfig::default());
    }
}
