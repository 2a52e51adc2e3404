//! Request handlers behind the NATS subjects.
//!
//! Handlers never fail: every outcome, including malformed payloads, is
//! turned into a reply for the caller.

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::models::inference::InferenceEngine;
use crate::report::{render_batch, render_scenario};
use crate::types::batch::BatchTable;
use crate::types::response::{new_request_id, BatchReply, PredictRequest, Reply, ScenarioReply};

/// Handle a JSON scenario request
pub fn handle_predict(
    engine: &InferenceEngine,
    metrics: &PipelineMetrics,
    payload: &[u8],
) -> Reply<ScenarioReply> {
    let start_time = Instant::now();

    let request: PredictRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Failed to deserialize prediction request");
            let err = PipelineError::InvalidRequest(e.to_string());
            metrics.record_failure(err.kind());
            return Reply::error(new_request_id(), &err);
        }
    };
    let request_id = request.request_id();

    match engine.predict_one(&request.features) {
        Ok(outcome) => {
            let processing_time = start_time.elapsed();
            metrics.record_scenario(
                processing_time,
                outcome.prediction.derived.delta_pct,
                outcome.explanation.is_some(),
            );

            let performance = engine
                .registry()
                .ready()
                .map(|loaded| loaded.performance)
                .ok();
            let text = match performance {
                Some(performance) => render_scenario(&outcome, &performance),
                None => String::new(),
            };

            debug!(
                request_id = %request_id,
                prediction = outcome.prediction.point_estimate,
                processing_time_us = processing_time.as_micros(),
                "Scenario request served"
            );

            Reply::ok(
                request_id,
                ScenarioReply {
                    text,
                    prediction: outcome.prediction,
                    explanation: outcome.explanation,
                    explanation_note: outcome.explanation_note,
                },
            )
        }
        Err(e) => {
            warn!(request_id = %request_id, kind = e.kind(), error = %e, "Prediction request failed");
            metrics.record_failure(e.kind());
            Reply::error(request_id, &e)
        }
    }
}

/// Handle a CSV batch request
pub fn handle_batch(
    engine: &InferenceEngine,
    metrics: &PipelineMetrics,
    payload: &[u8],
) -> Reply<BatchReply> {
    let start_time = Instant::now();
    let request_id = new_request_id();

    let result = BatchTable::from_reader(payload)
        .map_err(|e| PipelineError::InvalidTable(format!("{:#}", e)))
        .and_then(|table| engine.predict_batch(&table))
        .and_then(|result| {
            let csv = result
                .table
                .to_csv_string()
                .map_err(|e| PipelineError::InvalidTable(format!("{:#}", e)))?;
            Ok((result.summary, csv))
        });

    match result {
        Ok((summary, csv)) => {
            let processing_time = start_time.elapsed();
            metrics.record_batch(processing_time, summary.count);
            info!(
                request_id = %request_id,
                rows = summary.count,
                processing_time_us = processing_time.as_micros(),
                "Batch request served"
            );
            Reply::ok(
                request_id,
                BatchReply {
                    text: render_batch(&summary),
                    summary,
                    csv,
                },
            )
        }
        Err(e) => {
            warn!(request_id = %request_id, kind = e.kind(), error = %e, "Batch request failed");
            metrics.record_failure(e.kind());
            Reply::error(request_id, &e)
        }
    }
}
