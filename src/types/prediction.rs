//! Single-scenario prediction results

use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;

/// Quantities derived from the point estimate by fixed linear transforms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Daily energy equivalent (kWh/day)
    pub energy_equivalent_kwh: f64,
    /// Annual production (thousand m³/year)
    pub annual_thousand_m3: f64,
    /// Difference from the facility average (m³/day)
    pub delta_from_baseline: f64,
    /// Difference from the facility average, in percent
    pub delta_pct: f64,
}

impl DerivedMetrics {
    pub fn from_estimate(point_estimate: f64, calibration: &CalibrationConfig) -> Self {
        let delta = point_estimate - calibration.baseline_m3_per_day;
        Self {
            energy_equivalent_kwh: point_estimate * calibration.energy_kwh_per_m3,
            annual_thousand_m3: point_estimate * calibration.days_per_year
                / calibration.annual_unit_divisor,
            delta_from_baseline: delta,
            delta_pct: delta / calibration.baseline_m3_per_day * 100.0,
        }
    }
}

/// Predicted production plus derived metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted biogas production (m³/day)
    pub point_estimate: f64,
    pub derived: DerivedMetrics,
}

impl PredictionResult {
    pub fn new(point_estimate: f64, calibration: &CalibrationConfig) -> Self {
        Self {
            point_estimate,
            derived: DerivedMetrics::from_estimate(point_estimate, calibration),
        }
    }
}

/// Signed SHAP contribution of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: f64,
}

/// Ranked attribution for one scenario.
///
/// `base_value + contribution_sum` reproduces the point estimate; `top`
/// holds at most k entries ordered by descending magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    /// Explainer expected value (average model output)
    pub base_value: f64,
    /// Sum of all feature contributions, not just the ranked ones
    pub contribution_sum: f64,
    pub top: Vec<FeatureContribution>,
}

impl AttributionResult {
    /// Model output reconstructed from the attribution
    pub fn reconstructed_output(&self) -> f64 {
        self.base_value + self.contribution_sum
    }
}

/// One bar of a ranked chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub label: String,
    pub value: f64,
    pub color: String,
}

/// Chart-ready rankings sharing one color encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationCharts {
    /// Signed contributions
    pub contributions: Vec<ChartBar>,
    /// Absolute contributions
    pub importance: Vec<ChartBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub attribution: AttributionResult,
    pub charts: ExplanationCharts,
}

/// Everything produced for one scenario.
///
/// A missing explanation never invalidates the prediction; the reason is
/// kept in `explanation_note`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub prediction: PredictionResult,
    pub explanation: Option<Explanation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_metrics_are_linear() {
        let calibration = CalibrationConfig::default();
        for estimate in [0.0, -3.5, 79.21, 81.7, 150.0] {
            let derived = DerivedMetrics::from_estimate(estimate, &calibration);
            assert_eq!(derived.energy_equivalent_kwh, estimate * 6.5);
            assert_eq!(derived.annual_thousand_m3, estimate * 365.0 / 1000.0);
            assert_eq!(derived.delta_from_baseline, estimate - 79.21);
            assert_eq!(derived.delta_pct, (estimate - 79.21) / 79.21 * 100.0);
        }
    }

    #[test]
    fn test_baseline_estimate_has_no_delta() {
        let result = PredictionResult::new(79.21, &CalibrationConfig::default());
        assert_eq!(result.derived.delta_from_baseline, 0.0);
        assert_eq!(result.derived.delta_pct, 0.0);
    }

    #[test]
    fn test_custom_calibration() {
        let calibration = CalibrationConfig {
            energy_kwh_per_m3: 6.0,
            baseline_m3_per_day: 50.0,
            days_per_year: 360.0,
            annual_unit_divisor: 1.0,
        };
        let derived = DerivedMetrics::from_estimate(55.0, &calibration);
        assert_eq!(derived.energy_equivalent_kwh, 330.0);
        assert_eq!(derived.annual_thousand_m3, 19800.0);
        assert_eq!(derived.delta_pct, 10.0);
    }
}
