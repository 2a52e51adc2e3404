//! Scenario Producer
//!
//! Generates random operating scenarios and sends them to the prediction
//! service over NATS, logging each reply.

use biogas_predictor::feature_extractor::{ReferenceFeature, REFERENCE_FEATURES};
use biogas_predictor::types::{FeatureVector, PredictRequest};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Scenario generator drawing feature values from the reference ranges
struct ScenarioGenerator {
    rng: rand::rngs::ThreadRng,
}

impl ScenarioGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Scenario near the dataset means (within 10% of each range)
    fn generate_typical(&mut self) -> FeatureVector {
        REFERENCE_FEATURES
            .iter()
            .map(|f| {
                let spread = (f.max - f.min) * 0.1;
                let low = (f.mean - spread).max(f.min);
                let high = (f.mean + spread).min(f.max);
                (f.name, self.draw(low, high))
            })
            .collect()
    }

    /// Scenario drawn uniformly from the full observed ranges
    fn generate_extreme(&mut self) -> FeatureVector {
        REFERENCE_FEATURES
            .iter()
            .map(|f: &ReferenceFeature| (f.name, self.draw(f.min, f.max)))
            .collect()
    }

    fn draw(&mut self, low: f64, high: f64) -> f64 {
        let value = self.rng.gen_range(low..=high);
        (value * 100.0).round() / 100.0
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scenario_producer=info".parse()?),
        )
        .init();

    info!("Starting Scenario Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("biogas.predict");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let extreme_rate: f64 = args
        .get(4)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.1)
        .clamp(0.0, 1.0);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        extreme_rate = extreme_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, extreme_rate, delay_ms).await;
        }
    };

    let mut generator = ScenarioGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to send {} scenarios...", count);

    let mut typical_count = 0;
    let mut extreme_count = 0;
    let mut failed_count = 0;

    for i in 0..count {
        let features = if rng.gen_bool(extreme_rate) {
            extreme_count += 1;
            generator.generate_extreme()
        } else {
            typical_count += 1;
            generator.generate_typical()
        };

        let request = PredictRequest::new(features);
        let payload = serde_json::to_vec(&request)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => {
                let reply: serde_json::Value = serde_json::from_slice(&reply.payload)?;
                if reply["status"] == "ok" {
                    info!(
                        request_id = %reply["request_id"],
                        prediction = %reply["prediction"]["point_estimate"],
                        "Received prediction"
                    );
                } else {
                    failed_count += 1;
                    warn!(
                        request_id = %reply["request_id"],
                        message = %reply["message"],
                        "Prediction failed"
                    );
                }
            }
            Err(e) => {
                failed_count += 1;
                warn!(error = %e, "Request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} scenarios ({} typical, {} extreme, {} failed)",
                i + 1,
                count,
                typical_count,
                extreme_count,
                failed_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} scenarios ({} typical, {} extreme, {} failed)",
        count, typical_count, extreme_count, failed_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, extreme_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ScenarioGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let features = if rng.gen_bool(extreme_rate) {
            generator.generate_extreme()
        } else {
            generator.generate_typical()
        };

        let json = serde_json::to_string_pretty(&PredictRequest::new(features))?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample scenario {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
