//! Performance metrics and statistics tracking for the prediction service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Upper bounds (percent deviation from the facility baseline) of all but the
/// last distribution bucket.
const DELTA_BUCKET_BOUNDS: [f64; 6] = [-20.0, -10.0, -2.0, 2.0, 10.0, 20.0];

const DELTA_BUCKET_LABELS: [&str; 7] = [
    "   < -20%",
    "-20..-10%",
    " -10..-2%",
    "  -2..+2%",
    " +2..+10%",
    "+10..+20%",
    "   > +20%",
];

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Single scenarios predicted
    pub scenarios_processed: AtomicU64,
    /// Batch requests completed
    pub batches_processed: AtomicU64,
    /// Rows scored across all batches
    pub batch_rows: AtomicU64,
    /// Scenarios served without an explanation
    pub attribution_misses: AtomicU64,
    /// Failed requests by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Predictions bucketed by deviation from the baseline
    delta_buckets: RwLock<[u64; 7]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            scenarios_processed: AtomicU64::new(0),
            batches_processed: AtomicU64::new(0),
            batch_rows: AtomicU64::new(0),
            attribution_misses: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            delta_buckets: RwLock::new([0; 7]),
            start_time: Instant::now(),
        }
    }

    /// Record a predicted scenario
    pub fn record_scenario(&self, processing_time: Duration, delta_pct: f64, explained: bool) {
        self.scenarios_processed.fetch_add(1, Ordering::Relaxed);
        if !explained {
            self.attribution_misses.fetch_add(1, Ordering::Relaxed);
        }
        self.record_time(processing_time);

        let bucket = DELTA_BUCKET_BOUNDS
            .iter()
            .position(|&bound| delta_pct < bound)
            .unwrap_or(DELTA_BUCKET_BOUNDS.len());
        if let Ok(mut buckets) = self.delta_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a completed batch
    pub fn record_batch(&self, processing_time: Duration, rows: usize) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.batch_rows.fetch_add(rows as u64, Ordering::Relaxed);
        self.record_time(processing_time);
    }

    /// Record a failed request
    pub fn record_failure(&self, kind: &str) {
        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Total requests handled (scenarios plus batches)
    pub fn requests_processed(&self) -> u64 {
        self.scenarios_processed.load(Ordering::Relaxed)
            + self.batches_processed.load(Ordering::Relaxed)
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_processed() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get the baseline deviation distribution
    pub fn get_delta_distribution(&self) -> [u64; 7] {
        self.delta_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Get failures by error kind
    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|by_kind| by_kind.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let scenarios = self.scenarios_processed.load(Ordering::Relaxed);
        let batches = self.batches_processed.load(Ordering::Relaxed);
        let rows = self.batch_rows.load(Ordering::Relaxed);
        let misses = self.attribution_misses.load(Ordering::Relaxed);
        let explained_rate = if scenarios > 0 {
            ((scenarios - misses) as f64 / scenarios as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let failures = self.get_failures_by_kind();
        let delta_dist = self.get_delta_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║           BIOGAS PREDICTION SERVICE - METRICS SUMMARY        ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Scenarios Predicted:    {:>8}  │  Throughput: {:>6.1} req/s║",
            scenarios, throughput
        );
        info!(
            "║ Batches / Rows:  {:>6} / {:>8}  │  Explained:  {:>6.1}%     ║",
            batches, rows, explained_rate
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by Kind:                                            ║");
            for (kind, count) in &failures {
                info!("║   {:24}: {:>6}                            ║", kind, count);
            }
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Deviation from Facility Baseline:                            ║");
        let total: u64 = delta_dist.iter().sum();
        for (label, &count) in DELTA_BUCKET_LABELS.iter().zip(delta_dist.iter()) {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!("║   {}: {:>6} ({:>5.1}%) {}", label, count, pct, bar);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
