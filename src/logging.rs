//! Tracing subscriber setup shared by the service and the tools

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` directives are honored; the configured level applies to this
/// crate. `format = "json"` emits one JSON object per event.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("biogas_predictor={}", config.level).parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
