//! Scenario inputs and the statistics that describe them

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::feature_extractor::REFERENCE_FEATURES;

/// One operating scenario: feature name to value, in insertion order.
///
/// The order callers use does not matter; the values are reordered against
/// the registry's feature list before they reach the predictor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(IndexMap<String, f64>);

impl FeatureVector {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Set a feature value, replacing any previous one
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.0.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Per-feature descriptive statistics from the training data.
///
/// Used to seed default values and slider ranges; never enforced on inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub means: HashMap<String, f64>,
    pub mins: HashMap<String, f64>,
    pub maxs: HashMap<String, f64>,
}

impl FeatureStatistics {
    /// Statistics of the published dataset, used when no artifact is at hand
    pub fn reference() -> Self {
        let mut stats = Self::default();
        for feature in REFERENCE_FEATURES.iter() {
            stats.means.insert(feature.name.to_string(), feature.mean);
            stats.mins.insert(feature.name.to_string(), feature.min);
            stats.maxs.insert(feature.name.to_string(), feature.max);
        }
        stats
    }

    /// Names from `feature_names` lacking a mean, min, or max
    pub fn missing_features(&self, feature_names: &[String]) -> Vec<String> {
        feature_names
            .iter()
            .filter(|name| {
                !(self.means.contains_key(*name)
                    && self.mins.contains_key(*name)
                    && self.maxs.contains_key(*name))
            })
            .cloned()
            .collect()
    }

    /// A scenario with every feature at its mean, in `feature_names` order
    pub fn mean_vector(&self, feature_names: &[String]) -> FeatureVector {
        feature_names
            .iter()
            .filter_map(|name| self.means.get(name).map(|&v| (name.clone(), v)))
            .collect()
    }

    /// Range for a feature as `(min, max)`
    pub fn range(&self, name: &str) -> Option<(f64, f64)> {
        Some((*self.mins.get(name)?, *self.maxs.get(name)?))
    }
}

/// Held-out performance reported for the trained model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(alias = "R2", alias = "r2_score")]
    pub r2: f64,
    #[serde(alias = "RMSE")]
    pub rmse: f64,
    #[serde(alias = "MAE")]
    pub mae: f64,
    #[serde(alias = "MAPE")]
    pub mape: f64,
}
