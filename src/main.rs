//! Biogas Prediction Service - Main Entry Point
//!
//! Serves single-scenario and batch biogas predictions over NATS
//! request/reply. Requests are processed in parallel, bounded by the
//! configured worker count.

use anyhow::Result;
use biogas_predictor::{
    config::AppConfig,
    logging,
    metrics::{MetricsReporter, PipelineMetrics},
    models::{inference::InferenceEngine, registry::ModelRegistry},
    producer::ReplyPublisher,
    service::{handle_batch, handle_predict},
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
enum RequestKind {
    Predict,
    Batch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    info!("Starting Biogas Prediction Service");
    info!(
        "Calibration: {:.1} kWh/m³, baseline {:.2} m³/day",
        config.calibration.energy_kwh_per_m3, config.calibration.baseline_m3_per_day
    );

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Load the model registry once; it is read-only from here on
    let registry = Arc::new(ModelRegistry::load(&config.models));
    if !registry.is_ready() {
        warn!("Model registry unavailable; every request will receive an error reply");
    }
    let engine = Arc::new(InferenceEngine::new(registry, &config));

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let publisher = ReplyPublisher::new(client.clone());

    let num_workers = config.pipeline.workers.max(1);
    info!(
        "Starting request processing loop with {} parallel workers",
        num_workers
    );
    info!(
        "Listening on subjects: {}, {}",
        config.nats.predict_subject, config.nats.batch_subject
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter (prints summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    let predictions = client
        .subscribe(config.nats.predict_subject.clone())
        .await?
        .map(|message| (RequestKind::Predict, message));
    let batches = client
        .subscribe(config.nats.batch_subject.clone())
        .await?
        .map(|message| (RequestKind::Batch, message));
    let mut requests = futures::stream::select(predictions, batches);

    while let Some((kind, message)) = requests.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let engine = engine.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let published = match kind {
                RequestKind::Predict => {
                    let reply = handle_predict(&engine, &metrics, &message.payload);
                    publisher.publish(message.reply, &reply).await
                }
                RequestKind::Batch => {
                    // Scoring a large table is CPU-bound
                    let (engine, metrics) = (engine.clone(), metrics.clone());
                    let payload = message.payload;
                    match tokio::task::spawn_blocking(move || {
                        handle_batch(&engine, &metrics, &payload)
                    })
                    .await
                    {
                        Ok(reply) => publisher.publish(message.reply, &reply).await,
                        Err(e) => Err(anyhow::anyhow!("batch task failed: {}", e)),
                    }
                }
            };
            if let Err(e) = published {
                error!(kind = ?kind, error = %e, "Failed to publish reply");
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 requests
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} req/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            // Release permit when done
            drop(permit);
        });
    }

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
