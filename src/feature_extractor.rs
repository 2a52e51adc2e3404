//! Feature ordering for model inference.
//!
//! The predictor consumes positional rows, so every scenario and every batch
//! record is laid out in the exact order of the registry's feature list
//! before inference.

use crate::error::{PipelineError, PipelineResult};
use crate::types::scenario::FeatureVector;

/// A model input together with the statistics of the published dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFeature {
    pub name: &'static str,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

const fn feature(name: &'static str, mean: f64, max: f64) -> ReferenceFeature {
    ReferenceFeature {
        name,
        mean,
        min: 0.0,
        max,
    }
}

/// The 18 model inputs in training order: ten feedstocks (kg/day), five
/// operational parameters, three climate variables.
pub const REFERENCE_FEATURES: [ReferenceFeature; 18] = [
    feature("Pig Manure (kg)", 25.10, 60.71),
    feature("Kitchen Food Waste (kg)", 17.95, 47.32),
    feature("Chicken Litter (kg)", 12.01, 31.29),
    feature("Cassava (kg)", 20.03, 49.15),
    feature("Bagasse Feed (kg)", 15.09, 38.56),
    feature("Energy Grass (kg)", 10.04, 25.42),
    feature("Banana Shafts (kg)", 8.01, 21.42),
    feature("Alcohol Waste (kg)", 5.02, 12.21),
    feature("Municipal Residue (kg)", 11.99, 34.98),
    feature("Fish Waste (kg)", 5.99, 14.42),
    feature("Water (L)", 99.96, 217.79),
    feature("Diesel (L)", 2.00, 5.76),
    feature("Electricity Use (kWh)", 25.07, 63.79),
    feature("C/N Ratio", 25.00, 36.19),
    feature("Digester Temp (C)", 35.96, 42.00),
    feature("Temperature (C)", 29.98, 41.70),
    feature("Humidity (%)", 74.99, 111.65),
    feature("Rainfall (mm)", 4.97, 45.72),
];

/// Reference feature names in training order
pub fn reference_feature_names() -> Vec<String> {
    REFERENCE_FEATURES.iter().map(|f| f.name.to_string()).collect()
}

/// Lays out scenarios and table records in the predictor's column order.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    feature_names: Vec<String>,
}

impl FeatureExtractor {
    /// Create an extractor for the given ordered feature list
    pub fn new(feature_names: Vec<String>) -> Self {
        Self { feature_names }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Extract an ordered row from a scenario.
    ///
    /// Every expected feature must be present; extra keys are ignored.
    pub fn extract(&self, vector: &FeatureVector) -> PipelineResult<Vec<f64>> {
        let mut row = Vec::with_capacity(self.feature_names.len());
        let mut missing = Vec::new();

        for name in &self.feature_names {
            match vector.get(name) {
                Some(value) => row.push(value),
                None => missing.push(name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(PipelineError::Schema { missing });
        }
        Ok(row)
    }

    /// Position of each expected feature within a table header.
    ///
    /// Fails with the full list of absent columns, in feature order.
    pub fn column_indices(&self, headers: &[String]) -> PipelineResult<Vec<usize>> {
        let mut indices = Vec::with_capacity(self.feature_names.len());
        let mut missing = Vec::new();

        for name in &self.feature_names {
            match headers.iter().position(|h| h.trim() == name) {
                Some(idx) => indices.push(idx),
                None => missing.push(name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(PipelineError::Schema { missing });
        }
        Ok(indices)
    }

    /// Extract an ordered row from raw table cells.
    ///
    /// Empty cells become NaN and follow the model's missing-value routing.
    /// `row_number` is 1-based and only used for error messages.
    pub fn extract_record(
        &self,
        cells: &[String],
        indices: &[usize],
        row_number: usize,
    ) -> PipelineResult<Vec<f64>> {
        indices
            .iter()
            .zip(&self.feature_names)
            .map(|(&idx, name)| {
                let raw = cells.get(idx).map(|c| c.trim()).unwrap_or("");
                if raw.is_empty() {
                    return Ok(f64::NAN);
                }
                raw.parse::<f64>().map_err(|_| {
                    PipelineError::InvalidTable(format!(
                        "row {}: column '{}' has non-numeric value '{}'",
                        row_number, name, raw
                    ))
                })
            })
            .collect()
    }
}
