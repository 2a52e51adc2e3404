//! Attribution ranking and chart descriptions

use crate::config::ExplanationConfig;
use crate::types::prediction::{ChartBar, ExplanationCharts, FeatureContribution};

/// Select the `k` contributions with the largest magnitude.
///
/// The sort is stable, so equal magnitudes keep feature order.
pub fn top_contributions(names: &[String], values: &[f64], k: usize) -> Vec<FeatureContribution> {
    let mut ranked: Vec<FeatureContribution> = names
        .iter()
        .zip(values)
        .map(|(name, &value)| FeatureContribution {
            feature: name.clone(),
            contribution: value,
        })
        .collect();

    ranked.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
    ranked.truncate(k);
    ranked
}

/// Build the signed and absolute charts for ranked contributions
pub fn build_charts(top: &[FeatureContribution], config: &ExplanationConfig) -> ExplanationCharts {
    let color = |value: f64| {
        if value > 0.0 {
            config.positive_color.clone()
        } else {
            config.negative_color.clone()
        }
    };

    let contributions = top
        .iter()
        .map(|c| ChartBar {
            label: c.feature.clone(),
            value: c.contribution,
            color: color(c.contribution),
        })
        .collect();

    let importance = top
        .iter()
        .map(|c| ChartBar {
            label: c.feature.clone(),
            value: c.contribution.abs(),
            color: color(c.contribution),
        })
        .collect();

    ExplanationCharts {
        contributions,
        importance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn test_top_contributions_sorted_by_magnitude() {
        let top = top_contributions(&names(4), &[0.5, -2.0, 1.0, -0.1], 3);
        let order: Vec<&str> = top.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(order, vec!["f1", "f2", "f0"]);
        assert_eq!(top[0].contribution, -2.0);
    }

    #[test]
    fn test_top_contributions_truncates_to_k() {
        let values: Vec<f64> = (0..18).map(|i| i as f64).collect();
        let top = top_contributions(&names(18), &values, 10);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].feature, "f17");
        assert_eq!(top[9].feature, "f8");
    }

    #[test]
    fn test_ties_keep_feature_order() {
        let top = top_contributions(&names(5), &[0.0, 1.0, 0.0, -1.0, 0.0], 5);
        let order: Vec<&str> = top.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(order, vec!["f1", "f3", "f0", "f2", "f4"]);
    }

    #[test]
    fn test_fewer_features_than_k() {
        let top = top_contributions(&names(2), &[0.3, 0.2], 10);
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_chart_colors_follow_sign() {
        let config = ExplanationConfig::default();
        let top = top_contributions(&names(3), &[2.0, -1.0, 0.0], 3);
        let charts = build_charts(&top, &config);

        assert_eq!(charts.contributions[0].color, config.positive_color);
        assert_eq!(charts.contributions[1].color, config.negative_color);
        assert_eq!(charts.contributions[2].color, config.negative_color);

        assert_eq!(charts.contributions[1].value, -1.0);
        assert_eq!(charts.importance[1].value, 1.0);
        assert_eq!(charts.importance[1].color, config.negative_color);
    }
}
