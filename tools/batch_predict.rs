//! Offline Batch Predictor
//!
//! Scores a CSV file of scenarios without a running service.
//!
//! ```text
//! batch_predict <input.csv> [output.csv]
//! batch_predict --template [template.csv]
//! batch_predict --persist-explainer
//! ```

use anyhow::{bail, Context, Result};
use biogas_predictor::{
    config::AppConfig,
    logging,
    models::{explainer::TreeExplainer, loader::ModelLoader, registry::ModelRegistry},
    report::render_batch,
    types::BatchTable,
    InferenceEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const TEMPLATE_FILE: &str = "biogas_template.csv";

fn main() -> Result<()> {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    logging::init(&config.logging)?;
    if let Some(e) = config_error {
        warn!(error = %format!("{:#}", e), "Using default configuration");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(first) = args.first() else {
        bail!("usage: batch_predict <input.csv> [output.csv] | --template [path] | --persist-explainer");
    };

    let registry = ModelRegistry::load(&config.models);
    let loaded = registry.ready()?;

    match first.as_str() {
        "--template" => {
            let path = args.get(1).map(String::as_str).unwrap_or(TEMPLATE_FILE);
            BatchTable::template(&loaded.feature_names, &loaded.feature_stats).write_to_path(path)?;
            info!(path = %path, "Template written");
        }
        "--persist-explainer" => {
            let explainer = TreeExplainer::from_predictor(loaded.predictor.as_ref())?;
            let path = ModelLoader::new(&config.models)
                .models_dir()
                .join(&config.models.explainer_file);
            explainer.to_persisted().save(&path)?;
            info!(path = %path.display(), "Explainer persisted");
        }
        input => {
            let output = args
                .get(1)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&config.batch.output_file));

            let table = BatchTable::from_path(input)?;
            let engine = InferenceEngine::new(Arc::new(registry), &config);
            let result = engine
                .predict_batch(&table)
                .map_err(|e| anyhow::anyhow!(e.user_message()))
                .with_context(|| format!("Failed to score {}", input))?;

            result.table.write_to_path(&output)?;
            println!("{}", render_batch(&result.summary));
            info!(
                input = %input,
                output = %output.display(),
                rows = result.summary.count,
                "Batch predictions saved"
            );
        }
    }

    Ok(())
}
