//! Biogas Production Predictor Library
//!
//! Predicts daily biogas production of an anaerobic co-digestion facility
//! from feedstock, operational and climate features, and explains each
//! prediction with SHAP feature attributions.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod report;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use error::{PipelineError, PipelineResult};
pub use feature_extractor::FeatureExtractor;
pub use models::inference::InferenceEngine;
pub use models::registry::ModelRegistry;
pub use producer::ReplyPublisher;
pub use types::{
    batch::{BatchResult, BatchSummary, BatchTable},
    prediction::{PredictionResult, ScenarioOutcome},
    scenario::FeatureVector,
};
