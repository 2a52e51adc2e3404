//! Type definitions for the biogas prediction pipeline

pub mod batch;
pub mod prediction;
pub mod response;
pub mod scenario;

pub use batch::{BatchResult, BatchSummary, BatchTable};
pub use prediction::{
    AttributionResult, ChartBar, DerivedMetrics, Explanation, ExplanationCharts,
    FeatureContribution, PredictionResult, ScenarioOutcome,
};
pub use response::{BatchReply, PredictRequest, Reply, ReplyBody, ScenarioReply};
pub use scenario::{FeatureStatistics, FeatureVector, PerformanceMetrics};
