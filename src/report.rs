//! Markdown rendering of prediction outcomes

use crate::types::batch::BatchSummary;
use crate::types::prediction::ScenarioOutcome;
use crate::types::scenario::PerformanceMetrics;

/// Render a single-scenario outcome with the model's held-out performance
pub fn render_scenario(outcome: &ScenarioOutcome, performance: &PerformanceMetrics) -> String {
    let prediction = &outcome.prediction;
    let derived = &prediction.derived;

    let explanation = match (&outcome.explanation, &outcome.explanation_note) {
        (Some(explanation), _) => {
            let attribution = &explanation.attribution;
            let lines: String = attribution
                .top
                .iter()
                .map(|c| format!("- {}: {:+.2}\n", c.feature, c.contribution))
                .collect();
            format!(
                "### Top Feature Contributions:\n{}- *Base value:* {:.2} m³/day\n\n",
                lines, attribution.base_value
            )
        }
        (None, Some(note)) => format!("*Explanation unavailable: {}*\n\n", note),
        (None, None) => String::new(),
    };

    format!(
        "## 🌱 PREDICTION RESULTS\n\n\
         ### Main Output:\n\
         **Predicted Biogas Production: {:.2} m³/day**\n\n\
         ### Derived Metrics:\n\
         - **Energy Equivalent:** {:.1} kWh/day\n\
         - **Annual Production:** {:.1} thousand m³/year\n\
         - **vs. Facility Average:** {:+.2} m³/day ({:+.1}%)\n\n\
         {}\
         ### Model Performance:\n\
         - Testing R²: {:.4}\n\
         - RMSE: {:.2} m³\n\
         - MAE: {:.2} m³\n\
         - MAPE: {:.2}%",
        prediction.point_estimate,
        derived.energy_equivalent_kwh,
        derived.annual_thousand_m3,
        derived.delta_from_baseline,
        derived.delta_pct,
        explanation,
        performance.r2,
        performance.rmse,
        performance.mae,
        performance.mape,
    )
}

/// Render batch summary statistics
pub fn render_batch(summary: &BatchSummary) -> String {
    let stat = |value: Option<f64>| match value {
        Some(v) => format!("{:.2} m³/day", v),
        None => "n/a".to_string(),
    };

    format!(
        "## 📊 BATCH PREDICTION RESULTS\n\n\
         **Total Scenarios:** {}\n\n\
         ### Summary Statistics:\n\
         - **Mean Production:** {}\n\
         - **Std Deviation:** {}\n\
         - **Min Production:** {}\n\
         - **Max Production:** {}\n\
         - **Range:** {}",
        summary.count,
        stat(summary.mean),
        stat(summary.std),
        stat(summary.min),
        stat(summary.max),
        stat(summary.range),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;
    use crate::types::prediction::PredictionResult;

    fn performance() -> PerformanceMetrics {
        PerformanceMetrics {
            r2: 0.9887,
            rmse: 1.17,
            mae: 0.91,
            mape: 1.15,
        }
    }

    #[test]
    fn test_render_scenario() {
        let outcome = ScenarioOutcome {
            prediction: PredictionResult::new(81.0, &CalibrationConfig::default()),
            explanation: None,
            explanation_note: Some("no explainer loaded".to_string()),
        };
        let text = render_scenario(&outcome, &performance());

        assert!(text.contains("**Predicted Biogas Production: 81.00 m³/day**"));
        assert!(text.contains("- **Energy Equivalent:** 526.5 kWh/day"));
        assert!(text.contains("- **Annual Production:** 29.6 thousand m³/year"));
        assert!(text.contains("- **vs. Facility Average:** +1.79 m³/day (+2.3%)"));
        assert!(text.contains("*Explanation unavailable: no explainer loaded*"));
        assert!(text.contains("- Testing R²: 0.9887"));
        assert!(text.contains("- MAPE: 1.15%"));
    }

    #[test]
    fn test_render_scenario_with_contributions() {
        use crate::types::prediction::{AttributionResult, Explanation, FeatureContribution};
        let top = vec![
            FeatureContribution {
                feature: "C/N Ratio".to_string(),
                contribution: 2.5,
            },
            FeatureContribution {
                feature: "Digester Temp (C)".to_string(),
                contribution: -0.4,
            },
        ];
        let charts = crate::models::ranking::build_charts(&top, &Default::default());
        let outcome = ScenarioOutcome {
            prediction: PredictionResult::new(79.21, &CalibrationConfig::default()),
            explanation: Some(Explanation {
                attribution: AttributionResult {
                    base_value: 77.11,
                    contribution_sum: 2.1,
                    top,
                },
                charts,
            }),
            explanation_note: None,
        };
        let text = render_scenario(&outcome, &performance());

        assert!(text.contains(
            "### Top Feature Contributions:\n- C/N Ratio: +2.50\n- Digester Temp (C): -0.40\n- *Base value:* 77.11 m³/day\n\n### Model Performance:"
        ));
        assert!(text.starts_with("## 🌱 PREDICTION RESULTS\n\n### Main Output:\n"));
    }

    #[test]
    fn test_render_batch() {
        let summary = BatchSummary {
            count: 3,
            mean: Some(80.0),
            std: Some(1.5),
            min: Some(78.0),
            max: Some(82.0),
            range: Some(4.0),
        };
        let text = render_batch(&summary);
        assert!(text.contains("**Total Scenarios:** 3"));
        assert!(text.contains("- **Std Deviation:** 1.50 m³/day"));
        assert!(text.contains("- **Range:** 4.00 m³/day"));
    }

    #[test]
    fn test_render_empty_batch() {
        let text = render_batch(&BatchSummary::default());
        assert!(text.contains("**Total Scenarios:** 0"));
        assert!(text.contains("- **Mean Production:** n/a"));
    }
}
