//! Error taxonomy for prediction requests

use thiserror::Error;

/// Failures surfaced by the prediction pipeline.
///
/// Library and I/O faults are converted into one of these kinds at the
/// boundary of each public operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Model artifacts were missing or corrupt at startup
    #[error("model not loaded: {reason}")]
    RegistryUnavailable { reason: String },

    /// Required feature values or columns are absent
    #[error("missing required features: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// No explanation could be produced for this input
    #[error("explanation unavailable: {0}")]
    AttributionUnavailable(String),

    /// The predictor itself failed
    #[error("prediction failed during {stage}: {message}")]
    Prediction { stage: &'static str, message: String },

    /// A batch table could not be read or contains non-numeric feature cells
    #[error("invalid batch table: {0}")]
    InvalidTable(String),

    /// A request payload could not be decoded
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    /// Short machine-readable kind, used in replies and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::RegistryUnavailable { .. } => "registry_unavailable",
            PipelineError::Schema { .. } => "schema",
            PipelineError::AttributionUnavailable(_) => "attribution_unavailable",
            PipelineError::Prediction { .. } => "prediction",
            PipelineError::InvalidTable(_) => "invalid_table",
            PipelineError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Human-readable message, prefixed so it cannot be mistaken for a result
    pub fn user_message(&self) -> String {
        format!("❌ {}", self)
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_columns() {
        let err = PipelineError::Schema {
            missing: vec!["C/N Ratio".to_string(), "Water (L)".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "missing required features: C/N Ratio, Water (L)"
        );
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn test_user_message_is_prefixed() {
        let err = PipelineError::Prediction {
            stage: "model inference",
            message: "shape mismatch".to_string(),
        };
        assert_eq!(
            err.user_message(),
            "❌ prediction failed during model inference: shape mismatch"
        );
    }
}
