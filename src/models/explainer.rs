//! SHAP attribution for tree ensembles.
//!
//! `TreeExplainer` computes exact path-dependent TreeSHAP values
//! (Lundberg et al., "Consistent Individualized Feature Attribution for Tree
//! Ensembles", Algorithm 2). It relies on per-node training sample counts
//! and therefore only works for tree-ensemble predictors whose dump carries
//! `leaf_count`.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::predictor::Regressor;
use crate::models::tree::{Tree, TreeEnsemble, TreeNode};

/// Produces per-feature contributions explaining a predictor's output.
pub trait Explainer: Send + Sync {
    /// Model output when no feature is known (the SHAP base value)
    fn expected_value(&self) -> f64;

    /// One contribution vector per row, in feature order.
    ///
    /// For each row, `expected_value() + sum(contributions)` equals the
    /// model output.
    fn explain(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
}

/// Explainer state persisted next to the model it was built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedExplainer {
    /// SHA-256 of the model document the explainer belongs to
    pub model_fingerprint: String,
    pub num_features: usize,
    pub expected_value: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PersistedExplainer {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read explainer from {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse explainer {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write explainer to {}", path.display()))
    }
}

/// Exact TreeSHAP over a tree ensemble
pub struct TreeExplainer {
    model: Arc<TreeEnsemble>,
    expected_value: f64,
}

impl TreeExplainer {
    /// Build an explainer directly from a predictor.
    ///
    /// Fails unless the predictor is a tree ensemble with sample counts.
    pub fn from_predictor(predictor: &dyn Regressor) -> Result<Self> {
        let Some(ensemble) = predictor.as_tree_ensemble() else {
            bail!("TreeSHAP requires a tree-ensemble predictor");
        };
        Self::new(Arc::new(ensemble.clone()))
    }

    pub fn new(model: Arc<TreeEnsemble>) -> Result<Self> {
        if !model.has_cover() {
            bail!("model dump lacks leaf_count; TreeSHAP needs per-node sample counts");
        }
        let expected_value = model.expected_value();
        info!(
            trees = model.trees().len(),
            expected_value = expected_value,
            "TreeSHAP explainer created"
        );
        Ok(Self {
            model,
            expected_value,
        })
    }

    /// Reuse a persisted explainer if it was built for this exact model
    pub fn from_persisted(
        model: Arc<TreeEnsemble>,
        persisted: &PersistedExplainer,
    ) -> Result<Self> {
        if persisted.model_fingerprint != model.fingerprint() {
            bail!(
                "persisted explainer belongs to model {}, loaded model is {}",
                persisted.model_fingerprint,
                model.fingerprint()
            );
        }
        if persisted.num_features != model.num_features() {
            bail!(
                "persisted explainer expects {} features, model has {}",
                persisted.num_features,
                model.num_features()
            );
        }
        if !model.has_cover() {
            bail!("model dump lacks leaf_count; TreeSHAP needs per-node sample counts");
        }
        debug!(fingerprint = %persisted.model_fingerprint, "Using persisted explainer");
        Ok(Self {
            model,
            expected_value: persisted.expected_value,
        })
    }

    /// Snapshot suitable for `PersistedExplainer::save`
    pub fn to_persisted(&self) -> PersistedExplainer {
        PersistedExplainer {
            model_fingerprint: self.model.fingerprint().to_string(),
            num_features: self.model.num_features(),
            expected_value: self.expected_value,
            created_at: Some(Utc::now()),
        }
    }

    fn shap_row(&self, row: &[f64]) -> Vec<f64> {
        let mut phi = vec![0.0; self.model.num_features()];
        for tree in self.model.trees() {
            tree_shap(tree, 0, row, &mut phi, &[], 1.0, 1.0, NO_FEATURE);
        }
        phi
    }
}

impl Explainer for TreeExplainer {
    fn expected_value(&self) -> f64 {
        self.expected_value
    }

    fn explain(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let expected = self.model.num_features();
        rows.iter()
            .enumerate()
            .map(|(idx, row)| {
                if row.len() != expected {
                    bail!(
                        "row {} has {} values, explainer expects {}",
                        idx,
                        row.len(),
                        expected
                    );
                }
                Ok(self.shap_row(row))
            })
            .collect()
    }
}

/// Feature slot of the root path element, which never matches a split
const NO_FEATURE: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: usize,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

impl Default for PathElement {
    fn default() -> Self {
        Self {
            feature: NO_FEATURE,
            zero_fraction: 0.0,
            one_fraction: 0.0,
            pweight: 0.0,
        }
    }
}

fn extend_path(
    path: &mut [PathElement],
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: usize,
) {
    path[unique_depth] = PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if unique_depth == 0 { 1.0 } else { 0.0 },
    };
    let depth = unique_depth as f64;
    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        path[i + 1].pweight += one_fraction * path[i].pweight * (fi + 1.0) / (depth + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (depth - fi) / (depth + 1.0);
    }
}

fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let depth = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (depth + 1.0) / ((fi + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - fi) / (depth + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (depth + 1.0) / (zero_fraction * (depth - fi));
        }
    }

    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let depth = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (depth + 1.0) / ((fi + 1.0) * one_fraction);
            total += tmp;
            next_one_portion =
                path[i].pweight - tmp * zero_fraction * ((depth - fi) / (depth + 1.0));
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((depth - fi) / (depth + 1.0));
        }
    }
    total
}

#[allow(clippy::too_many_arguments)]
fn tree_shap(
    tree: &Tree,
    node: usize,
    row: &[f64],
    phi: &mut [f64],
    parent_path: &[PathElement],
    parent_zero_fraction: f64,
    parent_one_fraction: f64,
    parent_feature: usize,
) {
    let mut unique_depth = parent_path.len();
    let mut path = Vec::with_capacity(unique_depth + 1);
    path.extend_from_slice(parent_path);
    path.push(PathElement::default());
    extend_path(
        &mut path,
        unique_depth,
        parent_zero_fraction,
        parent_one_fraction,
        parent_feature,
    );

    match tree.node(node) {
        TreeNode::Leaf { value, .. } => {
            for i in 1..=unique_depth {
                let weight = unwound_path_sum(&path, unique_depth, i);
                let el = path[i];
                phi[el.feature] += weight * (el.one_fraction - el.zero_fraction) * value;
            }
        }
        TreeNode::Split {
            feature,
            left,
            right,
            cover,
            ..
        } => {
            let hot = tree.next_node(node, row).unwrap_or(*left);
            let cold = if hot == *left { *right } else { *left };
            let hot_zero_fraction = tree.node(hot).cover() / cover;
            let cold_zero_fraction = tree.node(cold).cover() / cover;
            let mut incoming_zero_fraction = 1.0;
            let mut incoming_one_fraction = 1.0;

            // Undo an earlier split on the same feature so it can be redone here
            let seen = path[..=unique_depth]
                .iter()
                .position(|el| el.feature == *feature);
            if let Some(k) = seen {
                incoming_zero_fraction = path[k].zero_fraction;
                incoming_one_fraction = path[k].one_fraction;
                unwind_path(&mut path, unique_depth, k);
                unique_depth -= 1;
            }

            let path = &path[..=unique_depth];
            tree_shap(
                tree,
                hot,
                row,
                phi,
                path,
                hot_zero_fraction * incoming_zero_fraction,
                incoming_one_fraction,
                *feature,
            );
            tree_shap(
                tree,
                cold,
                row,
                phi,
                path,
                cold_zero_fraction * incoming_zero_fraction,
                0.0,
                *feature,
            );
        }
    }
}
