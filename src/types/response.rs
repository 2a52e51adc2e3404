//! Request and reply envelopes exchanged over NATS

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::types::batch::BatchSummary;
use crate::types::prediction::{Explanation, PredictionResult};
use crate::types::scenario::FeatureVector;

/// Single-scenario prediction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Caller-supplied correlation id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub features: FeatureVector,
}

impl PredictRequest {
    pub fn new(features: FeatureVector) -> Self {
        Self {
            request_id: Some(new_request_id()),
            features,
        }
    }

    /// The caller's id, or a fresh one
    pub fn request_id(&self) -> String {
        self.request_id.clone().unwrap_or_else(new_request_id)
    }
}

pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Successful single-scenario reply body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReply {
    /// Markdown rendering for display
    pub text: String,
    pub prediction: PredictionResult,
    pub explanation: Option<Explanation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_note: Option<String>,
}

/// Successful batch reply body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReply {
    pub text: String,
    pub summary: BatchSummary,
    /// Input table with the prediction column appended
    pub csv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReplyBody<T> {
    Ok(T),
    Error { kind: String, message: String },
}

/// Reply envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply<T> {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: ReplyBody<T>,
}

impl<T> Reply<T> {
    pub fn ok(request_id: String, body: T) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            body: ReplyBody::Ok(body),
        }
    }

    pub fn error(request_id: String, error: &PipelineError) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            body: ReplyBody::Error {
                kind: error.kind().to_string(),
                message: error.user_message(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.body, ReplyBody::Ok(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;

    #[test]
    fn test_request_without_id() {
        let request: PredictRequest =
            serde_json::from_str(r#"{"features": {"C/N Ratio": 25.0}}"#).unwrap();
        assert!(request.request_id.is_none());
        assert_eq!(request.features.get("C/N Ratio"), Some(25.0));
        assert_eq!(request.request_id().len(), 36);
    }

    #[test]
    fn test_request_keeps_caller_id() {
        let request: PredictRequest =
            serde_json::from_str(r#"{"request_id": "abc", "features": {}}"#).unwrap();
        assert_eq!(request.request_id(), "abc");
    }

    #[test]
    fn test_ok_reply_shape() {
        let reply = Reply::ok(
            "r1".to_string(),
            ScenarioReply {
                text: "done".to_string(),
                prediction: PredictionResult::new(80.0, &CalibrationConfig::default()),
                explanation: None,
                explanation_note: None,
            },
        );
        assert!(reply.is_ok());

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["request_id"], "r1");
        assert_eq!(value["prediction"]["point_estimate"], 80.0);
        assert!(value.get("explanation_note").is_none());
    }

    #[test]
    fn test_error_reply_shape() {
        let err = PipelineError::Schema {
            missing: vec!["C/N Ratio".to_string()],
        };
        let reply: Reply<BatchReply> = Reply::error("r2".to_string(), &err);
        assert!(!reply.is_ok());

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "schema");
        assert_eq!(value["message"], "❌ missing required features: C/N Ratio");
    }
}
