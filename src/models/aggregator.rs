//! Summary statistics over batch predictions

use crate::types::batch::BatchSummary;

/// Aggregates per-row predictions into a batch summary.
pub struct PredictionAggregator;

impl PredictionAggregator {
    /// Summarize predictions.
    ///
    /// Statistics are `None` for an empty slice. `std` is the population
    /// standard deviation.
    pub fn summarize(predictions: &[f64]) -> BatchSummary {
        if predictions.is_empty() {
            return BatchSummary::default();
        }

        let count = predictions.len();
        let min = Self::min(predictions);
        let max = Self::max(predictions);
        let mut mean = Self::mean(predictions);
        // Rounding can push the mean of near-equal values just outside [min, max].
        // The bounds cross only when every value is NaN.
        if min <= max {
            mean = mean.clamp(min, max);
        }
        let std = Self::std_dev(predictions, mean);

        BatchSummary {
            count,
            mean: Some(mean),
            std: Some(std),
            min: Some(min),
            max: Some(max),
            range: Some(max - min),
        }
    }

    fn mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    fn std_dev(values: &[f64], mean: f64) -> f64 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        variance.sqrt()
    }

    fn min(values: &[f64]) -> f64 {
        values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    fn max(values: &[f64]) -> f64 {
        values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_statistics() {
        let summary = PredictionAggregator::summarize(&[70.0, 80.0, 90.0, 80.0]);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, Some(80.0));
        assert_eq!(summary.min, Some(70.0));
        assert_eq!(summary.max, Some(90.0));
        assert_eq!(summary.range, Some(20.0));
        assert!((summary.std.unwrap() - 50.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_single_prediction() {
        let summary = PredictionAggregator::summarize(&[79.21]);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.mean, Some(79.21));
        assert_eq!(summary.std, Some(0.0));
        assert_eq!(summary.range, Some(0.0));
    }

    #[test]
    fn test_empty_predictions() {
        let summary = PredictionAggregator::summarize(&[]);
        assert_eq!(summary.count, 0);
        assert!(summary.mean.is_none());
        assert!(summary.std.is_none());
        assert!(summary.min.is_none());
        assert!(summary.max.is_none());
        assert!(summary.range.is_none());
    }

    #[test]
    fn test_mean_within_bounds() {
        let values = vec![0.1 + 0.2; 7];
        let summary = PredictionAggregator::summarize(&values);
        let (min, mean, max) = (
            summary.min.unwrap(),
            summary.mean.unwrap(),
            summary.max.unwrap(),
        );
        assert!(min <= mean && mean <= max);
        assert_eq!(summary.range.unwrap(), max - min);
    }

    #[test]
    fn test_nan_predictions_do_not_panic() {
        let summary = PredictionAggregator::summarize(&[f64::NAN, f64::NAN]);
        assert_eq!(summary.count, 2);
        assert!(summary.mean.unwrap().is_nan());
    }
}
