// ==============================================================================
// ml/forest.rs - Regression Tree Ensemble
// ==============================================================================
// Description: JSON-serialized random-forest model evaluation
// Author: Matt Barham
// Created: 2026-06-24
// Modified: 2026-07-24
// Version: 1.0.0
// ==============================================================================

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::features::FEATURE_COUNT;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode model: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Model expects {0} features, pipeline provides {1}")]
    FeatureMismatch(usize, usize),

    #[error("Model has no trees")]
    Empty,

    #[error("Tree {tree} references node {node} out of bounds")]
    BadNodeIndex { tree: usize, node: usize },
}

/// One node of a regression tree. Internal nodes split on
/// `features[feature] <= threshold`; leaves carry the prediction and are
/// marked with a negative feature index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature: i32,
    pub threshold: f64,
    pub left: u32,
    pub right: u32,
    pub value: f64,
}

impl TreeNode {
    fn is_leaf(&self) -> bool {
        self.feature < 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Walk from the root to a leaf for the given feature vector.
    fn evaluate(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = &self.nodes[0];
        while !node.is_leaf() {
            let next = if features[node.feature as usize] <= node.threshold {
                node.left
            } else {
                node.right
            };
            node = &self.nodes[next as usize];
        }
        node.value
    }
}

/// Serialized regression-tree ensemble. The prediction is the mean of the
/// per-tree leaf values, clamped to the score range [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub n_features: usize,
    pub trees: Vec<Tree>,
}

impl ForestModel {
    /// Load and validate a model artifact.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path)?;
        let model: ForestModel = serde_json::from_str(&raw)?;
        model.validate()?;
        Ok(model)
    }

    /// Structural validation up front so `predict` cannot walk out of
    /// bounds at request time.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_features != FEATURE_COUNT {
            return Err(ModelError::FeatureMismatch(self.n_features, FEATURE_COUNT));
        }
        if self.trees.is_empty() {
            return Err(ModelError::Empty);
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::BadNodeIndex { tree: t, node: 0 });
            }
            for node in &tree.nodes {
                if node.is_leaf() {
                    continue;
                }
                let bad_feature = node.feature as usize >= FEATURE_COUNT;
                let bad_child = node.left as usize >= tree.nodes.len()
                    || node.right as usize >= tree.nodes.len();
                if bad_feature || bad_child {
                    return Err(ModelError::BadNodeIndex {
                        tree: t,
                        node: node.left.max(node.right) as usize,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.evaluate(features)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: f64) -> TreeNode {
        TreeNode {
            feature: -1,
            threshold: 0.0,
            left: 0,
            right: 0,
            value,
        }
    }

    fn split(feature: i32, threshold: f64, left: u32, right: u32) -> TreeNode {
        TreeNode {
            feature,
            threshold,
            left,
            right,
            value: 0.0,
        }
    }

    fn model() -> ForestModel {
        // Tree 0: CADD (feature 8) <= 20 -> 0.2, else 0.9
        // Tree 1: constant 0.5
        ForestModel {
            n_features: FEATURE_COUNT,
            trees: vec![
                Tree {
                    nodes: vec![split(8, 20.0, 1, 2), leaf(0.2), leaf(0.9)],
                },
                Tree {
                    nodes: vec![leaf(0.5)],
                },
            ],
        }
    }

    #[test]
    fn test_predict_mean_over_trees() {
        let m = model();
        let mut features = [0.0; FEATURE_COUNT];

        features[8] = 10.0;
        assert!((m.predict(&features) - 0.35).abs() < 1e-9);

        features[8] = 30.0;
        assert!((m.predict(&features) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_predict_clamps_to_unit_interval() {
        let m = ForestModel {
            n_features: FEATURE_COUNT,
            trees: vec![Tree {
                nodes: vec![leaf(1.7)],
            }],
        };
        assert_eq!(m.predict(&[0.0; FEATURE_COUNT]), 1.0);

        let m = ForestModel {
            n_features: FEATURE_COUNT,
            trees: vec![Tree {
                nodes: vec![leaf(-0.3)],
            }],
        };
        assert_eq!(m.predict(&[0.0; FEATURE_COUNT]), 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_models() {
        let mut m = model();
        m.n_features = 4;
        assert!(matches!(m.validate(), Err(ModelError::FeatureMismatch(4, _))));

        let empty = ForestModel {
            n_features: FEATURE_COUNT,
            trees: vec![],
        };
        assert!(matches!(empty.validate(), Err(ModelError::Empty)));

        let dangling = ForestModel {
            n_features: FEATURE_COUNT,
            trees: vec![Tree {
                nodes: vec![split(0, 1.0, 1, 9)],
            }],
        };
        assert!(matches!(
            dangling.validate(),
            Err(ModelError::BadNodeIndex { .. })
        ));
    }

    #[test]
    fn test_load_round_trip() {
        let m = model();
        let json = serde_json::to_string(&m).unwrap();
        let decoded: ForestModel = serde_json::from_str(&json).unwrap();
        decoded.validate().unwrap();
        assert_eq!(decoded.tree_count(), 2);
    }
}
