//! Predictor seam between the pipeline and the model implementation

use anyhow::Result;

use crate::models::tree::TreeEnsemble;

/// A fitted regressor consuming positional feature rows.
pub trait Regressor: Send + Sync {
    /// Number of values expected in each row
    fn num_features(&self) -> usize;

    /// Predict a single row
    fn predict_row(&self, row: &[f64]) -> Result<f64>;

    /// Predict many rows, preserving order
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// The underlying tree ensemble, when the model belongs to that family.
    ///
    /// TreeSHAP explanations can only be derived from tree ensembles.
    fn as_tree_ensemble(&self) -> Option<&TreeEnsemble> {
        None
    }
}

impl Regressor for TreeEnsemble {
    fn num_features(&self) -> usize {
        TreeEnsemble::num_features(self)
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        TreeEnsemble::predict_row(self, row)
    }

    fn as_tree_ensemble(&self) -> Option<&TreeEnsemble> {
        Some(self)
    }
}
