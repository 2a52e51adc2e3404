//! Batch prediction over tabular scenarios

use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::feature_extractor::FeatureExtractor;
use crate::models::aggregator::PredictionAggregator;
use crate::models::registry::LoadedRegistry;
use crate::types::batch::{BatchResult, BatchTable};

/// Scores every row of a table with the registry's predictor.
pub struct BatchPredictor<'a> {
    registry: &'a LoadedRegistry,
    prediction_column: &'a str,
}

impl<'a> BatchPredictor<'a> {
    pub fn new(registry: &'a LoadedRegistry, prediction_column: &'a str) -> Self {
        Self {
            registry,
            prediction_column,
        }
    }

    /// Predict one value per row, in row order.
    ///
    /// The whole table is rejected when a required column is missing, a
    /// cell is not numeric or the model yields a non-finite value. An
    /// existing prediction column is overwritten. An empty table yields an empty prediction
    /// column and an empty summary.
    pub fn predict(&self, table: &BatchTable) -> PipelineResult<BatchResult> {
        let extractor = FeatureExtractor::new(self.registry.feature_names.clone());
        let indices = extractor.column_indices(&table.headers)?;

        let rows = table
            .rows
            .iter()
            .enumerate()
            .map(|(idx, cells)| extractor.extract_record(cells, &indices, idx + 1))
            .collect::<PipelineResult<Vec<_>>>()?;

        let predictions = if rows.is_empty() {
            Vec::new()
        } else {
            self.registry
                .predictor
                .predict_rows(&rows)
                .map_err(|e| PipelineError::Prediction {
                    stage: "batch inference",
                    message: format!("{:#}", e),
                })?
        };

        if let Some(idx) = predictions.iter().position(|p| !p.is_finite()) {
            return Err(PipelineError::Prediction {
                stage: "batch inference",
                message: format!("model returned {} for row {}", predictions[idx], idx + 1),
            });
        }

        debug!(rows = predictions.len(), "Batch rows scored");

        let summary = PredictionAggregator::summarize(&predictions);
        let mut output = table.clone();
        output.set_column(self.prediction_column, &predictions);

        info!(
            rows = summary.count,
            mean = ?summary.mean,
            "Batch prediction complete"
        );

        Ok(BatchResult {
            table: output,
            predictions,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::predictor::Regressor;
    use crate::models::registry::tests::fixture_registry;
    use crate::models::registry::ModelRegistry;
    use crate::types::scenario::PerformanceMetrics;
    use std::sync::Arc;

    const COLUMN: &str = "Predicted_Biogas_m3";

    fn mean_table(registry: &LoadedRegistry) -> BatchTable {
        BatchTable::template(&registry.feature_names, &registry.feature_stats)
    }

    fn set_cell(table: &mut BatchTable, row: usize, column: &str, value: &str) {
        let idx = table.headers.iter().position(|h| h == column).unwrap();
        table.rows[row][idx] = value.to_string();
    }

    #[test]
    fn test_predictions_follow_row_order() {
        let registry = fixture_registry();
        let loaded = registry.ready().unwrap();

        let mut table = mean_table(loaded);
        let mean_row = table.rows[0].clone();
        table.rows.push(mean_row.clone());
        table.rows.push(mean_row);
        set_cell(&mut table, 1, "C/N Ratio", "35");
        set_cell(&mut table, 2, "Pig Manure (kg)", "10");

        let result = BatchPredictor::new(loaded, COLUMN).predict(&table).unwrap();

        assert_eq!(result.predictions.len(), 3);
        assert!((result.predictions[0] - 79.21).abs() < 1e-9);
        assert!((result.predictions[1] - 70.0).abs() < 1e-9);
        assert!((result.predictions[2] - 77.21).abs() < 1e-9);

        assert_eq!(result.table.headers.last().unwrap(), COLUMN);
        assert_eq!(result.table.rows.len(), 3);
        assert_eq!(result.table.rows[1].last().unwrap(), "70");
    }

    #[test]
    fn test_missing_column_is_reported_exactly() {
        let registry = fixture_registry();
        let loaded = registry.ready().unwrap();

        let mut table = mean_table(loaded);
        let idx = table.headers.iter().position(|h| h == "C/N Ratio").unwrap();
        table.headers.remove(idx);
        table.rows[0].remove(idx);

        let err = BatchPredictor::new(loaded, COLUMN).predict(&table).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Schema {
                missing: vec!["C/N Ratio".to_string()]
            }
        );
    }

    #[test]
    fn test_empty_table() {
        let registry = fixture_registry();
        let loaded = registry.ready().unwrap();

        let table = BatchTable::new(loaded.feature_names.clone(), Vec::new());
        let result = BatchPredictor::new(loaded, COLUMN).predict(&table).unwrap();

        assert!(result.predictions.is_empty());
        assert!(result.table.rows.is_empty());
        assert_eq!(result.table.headers.last().unwrap(), COLUMN);
        assert_eq!(result.summary.count, 0);
        assert!(result.summary.mean.is_none());
    }

    #[test]
    fn test_non_numeric_cell_names_row_and_column() {
        let registry = fixture_registry();
        let loaded = registry.ready().unwrap();

        let mut table = mean_table(loaded);
        set_cell(&mut table, 0, "Humidity (%)", "humid");

        match BatchPredictor::new(loaded, COLUMN).predict(&table) {
            Err(PipelineError::InvalidTable(message)) => {
                assert!(message.contains("row 1"));
                assert!(message.contains("Humidity (%)"));
            }
            other => panic!("expected InvalidTable, got {:?}", other.map(|r| r.predictions)),
        }
    }

    #[test]
    fn test_empty_cell_is_treated_as_missing() {
        let registry = fixture_registry();
        let loaded = registry.ready().unwrap();

        let mut table = mean_table(loaded);
        set_cell(&mut table, 0, "Rainfall (mm)", "");

        let result = BatchPredictor::new(loaded, COLUMN).predict(&table).unwrap();
        assert!((result.predictions[0] - 79.21).abs() < 1e-9);
    }

    #[test]
    fn test_summary_bounds() {
        let registry = fixture_registry();
        let loaded = registry.ready().unwrap();

        let mut table = mean_table(loaded);
        let mean_row = table.rows[0].clone();
        table.rows.push(mean_row);
        set_cell(&mut table, 1, "Digester Temp (C)", "40");

        let summary = BatchPredictor::new(loaded, COLUMN)
            .predict(&table)
            .unwrap()
            .summary;
        let (min, mean, max) = (
            summary.min.unwrap(),
            summary.mean.unwrap(),
            summary.max.unwrap(),
        );
        assert!(min <= mean && mean <= max);
        assert_eq!(summary.range.unwrap(), max - min);
        assert!((max - 80.41).abs() < 1e-9);
    }

    #[test]
    fn test_rescoring_overwrites_prediction_column() {
        let registry = fixture_registry();
        let loaded = registry.ready().unwrap();
        let predictor = BatchPredictor::new(loaded, COLUMN);

        let once = predictor.predict(&mean_table(loaded)).unwrap();
        let mut rescored_input = once.table.clone();
        set_cell(&mut rescored_input, 0, "Digester Temp (C)", "40");
        let twice = predictor.predict(&rescored_input).unwrap();

        assert_eq!(twice.table.headers, once.table.headers);
        assert_eq!(
            twice.table.headers.iter().filter(|h| *h == COLUMN).count(),
            1
        );
        assert!((twice.predictions[0] - 80.41).abs() < 1e-9);
        let written: f64 = twice.table.rows[0].last().unwrap().parse().unwrap();
        assert_eq!(written, twice.predictions[0]);
    }

    struct NanRegressor(usize);

    impl Regressor for NanRegressor {
        fn num_features(&self) -> usize {
            self.0
        }

        fn predict_row(&self, _row: &[f64]) -> anyhow::Result<f64> {
            Ok(f64::NAN)
        }
    }

    #[test]
    fn test_non_finite_prediction_is_rejected() {
        let fixture = fixture_registry();
        let loaded = fixture.ready().unwrap();
        let table = mean_table(loaded);

        let registry = ModelRegistry::from_parts(
            Arc::new(NanRegressor(loaded.feature_names.len())),
            loaded.feature_names.clone(),
            loaded.feature_stats.clone(),
            PerformanceMetrics {
                r2: 0.0,
                rmse: 0.0,
                mae: 0.0,
                mape: 0.0,
            },
            None,
        );
        let nan_loaded = registry.ready().unwrap();

        match BatchPredictor::new(nan_loaded, COLUMN).predict(&table) {
            Err(PipelineError::Prediction { stage, message }) => {
                assert_eq!(stage, "batch inference");
                assert!(message.contains("row 1"));
            }
            other => panic!("expected Prediction error, got {:?}", other.map(|r| r.predictions)),
        }
    }
}
