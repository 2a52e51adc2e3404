//! Gradient-boosted tree ensemble evaluated from a LightGBM model dump.
//!
//! The model document is the JSON produced by LightGBM's `dump_model()`.
//! Trees are flattened into node arrays at load time; only numerical `<=`
//! splits with identity-linked regression objectives are supported.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Values with magnitude at or below this are treated as zero by
/// `missing_type = "Zero"` splits.
const ZERO_THRESHOLD: f64 = 1e-35;

/// Objectives whose raw score is the prediction
const IDENTITY_OBJECTIVES: [&str; 6] = [
    "regression",
    "regression_l1",
    "huber",
    "fair",
    "quantile",
    "mape",
];

#[derive(Debug, Deserialize)]
struct ModelDump {
    #[serde(default)]
    objective: Option<String>,
    #[serde(default = "default_num_class")]
    num_class: usize,
    #[serde(default)]
    max_feature_idx: Option<usize>,
    #[serde(default)]
    feature_names: Vec<String>,
    #[serde(default)]
    average_output: bool,
    tree_info: Vec<TreeDump>,
}

fn default_num_class() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct TreeDump {
    #[serde(default)]
    tree_index: usize,
    tree_structure: NodeDump,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeDump {
    Split {
        split_feature: usize,
        threshold: f64,
        decision_type: String,
        #[serde(default = "default_true")]
        default_left: bool,
        #[serde(default = "default_missing_type")]
        missing_type: String,
        left_child: Box<NodeDump>,
        right_child: Box<NodeDump>,
    },
    Leaf {
        leaf_value: f64,
        #[serde(default)]
        leaf_count: Option<f64>,
    },
}

fn default_true() -> bool {
    true
}

fn default_missing_type() -> String {
    "None".to_string()
}

/// How a split routes missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingType {
    /// NaN is treated as zero
    None,
    /// Zero and NaN take the default branch
    Zero,
    /// NaN takes the default branch
    NaN,
}

impl MissingType {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "None" => Ok(MissingType::None),
            "Zero" => Ok(MissingType::Zero),
            "NaN" => Ok(MissingType::NaN),
            other => bail!("unsupported missing_type '{}'", other),
        }
    }
}

/// A flattened tree node. Child links index into the owning tree's node array.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        missing: MissingType,
        left: usize,
        right: usize,
        /// Training samples routed through this node
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Split { cover, .. } | TreeNode::Leaf { cover, .. } => *cover,
        }
    }
}

/// One regression tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    /// Child index the row follows at a split node, or `None` at a leaf
    pub fn next_node(&self, idx: usize, row: &[f64]) -> Option<usize> {
        match &self.nodes[idx] {
            TreeNode::Split {
                feature,
                threshold,
                default_left,
                missing,
                left,
                right,
                ..
            } => {
                let goes_left = decide(row[*feature], *threshold, *default_left, *missing);
                Some(if goes_left { *left } else { *right })
            }
            TreeNode::Leaf { .. } => None,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        while let Some(next) = self.next_node(idx, row) {
            idx = next;
        }
        match &self.nodes[idx] {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { .. } => unreachable!("traversal ends at a leaf"),
        }
    }

    /// Cover-weighted mean of the leaf values
    pub fn expected_value(&self) -> f64 {
        self.node_expectation(0)
    }

    fn node_expectation(&self, idx: usize) -> f64 {
        match &self.nodes[idx] {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                left, right, cover, ..
            } => {
                let l = self.node_expectation(*left) * self.nodes[*left].cover();
                let r = self.node_expectation(*right) * self.nodes[*right].cover();
                (l + r) / cover
            }
        }
    }

    /// Flatten a dumped tree. Returns the tree and whether every leaf carried
    /// a sample count.
    fn from_dump(root: NodeDump, scale: f64) -> Result<(Self, bool)> {
        let mut nodes = Vec::new();
        let mut complete = true;
        flatten(root, scale, &mut nodes, &mut complete)?;
        Ok((Self { nodes }, complete))
    }
}

fn decide(value: f64, threshold: f64, default_left: bool, missing: MissingType) -> bool {
    let mut value = value;
    match missing {
        MissingType::None => {
            if value.is_nan() {
                value = 0.0;
            }
        }
        MissingType::Zero => {
            if value.is_nan() || value.abs() <= ZERO_THRESHOLD {
                return default_left;
            }
        }
        MissingType::NaN => {
            if value.is_nan() {
                return default_left;
            }
        }
    }
    value <= threshold
}

fn flatten(
    node: NodeDump,
    scale: f64,
    nodes: &mut Vec<TreeNode>,
    complete: &mut bool,
) -> Result<usize> {
    let idx = nodes.len();
    match node {
        NodeDump::Leaf {
            leaf_value,
            leaf_count,
        } => {
            let cover = match leaf_count {
                Some(count) if count.is_finite() && count >= 0.0 => count,
                Some(count) => bail!("invalid leaf_count {}", count),
                None => {
                    *complete = false;
                    1.0
                }
            };
            nodes.push(TreeNode::Leaf {
                value: leaf_value * scale,
                cover,
            });
        }
        NodeDump::Split {
            split_feature,
            threshold,
            decision_type,
            default_left,
            missing_type,
            left_child,
            right_child,
        } => {
            if decision_type != "<=" {
                bail!(
                    "unsupported decision_type '{}' on feature {} (categorical splits are not supported)",
                    decision_type,
                    split_feature
                );
            }
            let missing = MissingType::parse(&missing_type)?;
            // Reserve the slot; children are appended after it
            nodes.push(TreeNode::Leaf {
                value: 0.0,
                cover: 0.0,
            });
            let left = flatten(*left_child, scale, nodes, complete)?;
            let right = flatten(*right_child, scale, nodes, complete)?;
            // Cover is recomputed from the leaves so parent == sum of children
            let cover = nodes[left].cover() + nodes[right].cover();
            if cover <= 0.0 {
                bail!("split on feature {} has no training samples", split_feature);
            }
            nodes[idx] = TreeNode::Split {
                feature: split_feature,
                threshold,
                default_left,
                missing,
                left,
                right,
                cover,
            };
        }
    }
    Ok(idx)
}

/// Tree ensemble regressor
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
    num_features: usize,
    feature_names: Vec<String>,
    has_cover: bool,
    fingerprint: String,
}

impl TreeEnsemble {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read model from {}", path.display()))?;
        Self::from_json_bytes(&bytes)
    }

    /// Parse a LightGBM `dump_model()` document
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let dump: ModelDump =
            serde_json::from_slice(bytes).context("Failed to parse LightGBM model dump")?;

        if dump.num_class != 1 {
            bail!(
                "expected a single-output regressor, found num_class = {}",
                dump.num_class
            );
        }
        if let Some(objective) = &dump.objective {
            let name = objective.split_whitespace().next().unwrap_or("");
            if !IDENTITY_OBJECTIVES.contains(&name) {
                bail!(
                    "unsupported objective '{}': only identity-linked regression is supported",
                    objective
                );
            }
        }
        if dump.tree_info.is_empty() {
            bail!("model contains no trees");
        }

        let scale = if dump.average_output {
            1.0 / dump.tree_info.len() as f64
        } else {
            1.0
        };

        let mut trees = Vec::with_capacity(dump.tree_info.len());
        let mut has_cover = true;
        let mut max_split_feature = None;
        for tree in dump.tree_info {
            let (flat, complete) = Tree::from_dump(tree.tree_structure, scale)
                .with_context(|| format!("Invalid tree {}", tree.tree_index))?;
            has_cover &= complete;
            for node in flat.nodes() {
                if let TreeNode::Split { feature, .. } = node {
                    max_split_feature = max_split_feature.max(Some(*feature));
                }
            }
            trees.push(flat);
        }

        let num_features = if !dump.feature_names.is_empty() {
            dump.feature_names.len()
        } else if let Some(max_idx) = dump.max_feature_idx {
            max_idx + 1
        } else {
            max_split_feature.map(|f| f + 1).unwrap_or(0)
        };
        if let Some(max_split) = max_split_feature {
            if max_split >= num_features {
                bail!(
                    "tree splits on feature {} but the model declares {} features",
                    max_split,
                    num_features
                );
            }
        }

        Ok(Self {
            trees,
            num_features,
            feature_names: dump.feature_names,
            has_cover,
            fingerprint: hex::encode(Sha256::digest(bytes)),
        })
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Feature names embedded in the dump (may be empty)
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Whether every node carries a training sample count
    pub fn has_cover(&self) -> bool {
        self.has_cover
    }

    /// SHA-256 of the model document, hex encoded
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.num_features {
            bail!(
                "expected {} feature values, got {}",
                self.num_features,
                row.len()
            );
        }
        Ok(self.trees.iter().map(|t| t.predict(row)).sum())
    }

    /// Average model output over the training distribution
    pub fn expected_value(&self) -> f64 {
        self.trees.iter().map(|t| t.expected_value()).sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Fixture model shared with the integration tests
    pub(crate) const FIXTURE_MODEL: &str = include_str!("../../tests/fixtures/models/model.json");

    pub(crate) fn stump(
        feature: usize,
        threshold: f64,
        left: (f64, f64),
        right: (f64, f64),
    ) -> serde_json::Value {
        json!({
            "split_feature": feature,
            "threshold": threshold,
            "decision_type": "<=",
            "default_left": true,
            "missing_type": "None",
            "left_child": {"leaf_value": left.0, "leaf_count": left.1},
            "right_child": {"leaf_value": right.0, "leaf_count": right.1}
        })
    }

    pub(crate) fn model_json(trees: Vec<serde_json::Value>, num_features: usize) -> Vec<u8> {
        let tree_info: Vec<_> = trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| json!({"tree_index": i, "tree_structure": t}))
            .collect();
        serde_json::to_vec(&json!({
            "objective": "regression",
            "num_class": 1,
            "max_feature_idx": num_features - 1,
            "tree_info": tree_info
        }))
        .unwrap()
    }

    #[test]
    fn test_stump_prediction_and_expectation() {
        let bytes = model_json(vec![stump(0, 1.0, (10.0, 30.0), (20.0, 70.0))], 2);
        let model = TreeEnsemble::from_json_bytes(&bytes).unwrap();

        assert_eq!(model.num_features(), 2);
        assert!(model.has_cover());
        assert_eq!(model.predict_row(&[0.5, 0.0]).unwrap(), 10.0);
        assert_eq!(model.predict_row(&[1.0, 0.0]).unwrap(), 10.0);
        assert_eq!(model.predict_row(&[1.5, 0.0]).unwrap(), 20.0);
        assert!((model.expected_value() - 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_row_length_is_checked() {
        let bytes = model_json(vec![stump(0, 1.0, (1.0, 1.0), (2.0, 1.0))], 3);
        let model = TreeEnsemble::from_json_bytes(&bytes).unwrap();
        assert!(model.predict_row(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_missing_value_routing() {
        assert!(!decide(f64::NAN, -1.0, false, MissingType::None));
        assert!(decide(f64::NAN, 1.0, false, MissingType::None));
        assert!(decide(f64::NAN, -1.0, true, MissingType::NaN));
        assert!(!decide(f64::NAN, 5.0, false, MissingType::NaN));
        assert!(!decide(0.0, 5.0, false, MissingType::Zero));
        assert!(decide(3.0, 5.0, false, MissingType::Zero));
    }

    #[test]
    fn test_average_output_scales_leaves() {
        let mut value: serde_json::Value = serde_json::from_slice(&model_json(
            vec![
                stump(0, 1.0, (10.0, 1.0), (20.0, 1.0)),
                stump(0, 1.0, (30.0, 1.0), (40.0, 1.0)),
            ],
            1,
        ))
        .unwrap();
        value["average_output"] = json!(true);
        let model = TreeEnsemble::from_json_bytes(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert!((model.predict_row(&[0.0]).unwrap() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_split_rejected() {
        let tree = json!({
            "split_feature": 0,
            "threshold": 1.0,
            "decision_type": "==",
            "left_child": {"leaf_value": 1.0},
            "right_child": {"leaf_value": 2.0}
        });
        let err = TreeEnsemble::from_json_bytes(&model_json(vec![tree], 1)).unwrap_err();
        assert!(format!("{:#}", err).contains("categorical"));
    }

    #[test]
    fn test_non_identity_objective_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_slice(&model_json(vec![json!({"leaf_value": 1.0})], 1)).unwrap();
        value["objective"] = json!("binary sigmoid:1");
        assert!(TreeEnsemble::from_json_bytes(&serde_json::to_vec(&value).unwrap()).is_err());
    }

    #[test]
    fn test_missing_counts_disable_cover() {
        let tree = json!({
            "split_feature": 0,
            "threshold": 1.0,
            "decision_type": "<=",
            "left_child": {"leaf_value": 1.0},
            "right_child": {"leaf_value": 2.0}
        });
        let model = TreeEnsemble::from_json_bytes(&model_json(vec![tree], 1)).unwrap();
        assert!(!model.has_cover());
        assert_eq!(model.predict_row(&[2.0]).unwrap(), 2.0);
    }

    #[test]
    fn test_fixture_model_loads() {
        let model = TreeEnsemble::from_json_bytes(FIXTURE_MODEL.as_bytes()).unwrap();
        assert_eq!(model.num_features(), 18);
        assert_eq!(model.trees().len(), 3);
        assert_eq!(model.fingerprint().len(), 64);
    }
}
