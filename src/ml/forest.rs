//! Native tree ensemble used for inference and explanations.
//!
//! Nodes are stored in flat arrays indexed by node id, root at 0. A node is a
//! leaf when its left child is `LEAF`.

use crate::error::{AppError, Result};
use ndarray::{ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Child index marking a leaf
pub const LEAF: i32 = -1;

/// Output transformation applied to the ensemble margin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// `binary:logistic`: sigmoid of the margin
    BinaryLogistic,
    /// `binary:logitraw`: margin is returned raw, probability still via sigmoid
    BinaryLogitRaw,
}

impl Objective {
    pub fn name(&self) -> &'static str {
        match self {
            Objective::BinaryLogistic => "binary:logistic",
            Objective::BinaryLogitRaw => "binary:logitraw",
        }
    }
}

/// A single regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub left: Vec<i32>,
    pub right: Vec<i32>,
    pub split_feature: Vec<u32>,
    pub threshold: Vec<f32>,
    pub default_left: Vec<bool>,
    /// Leaf outputs; ignored for split nodes
    pub leaf_value: Vec<f64>,
    /// Training hessian mass reaching each node
    pub cover: Vec<f64>,
}

impl Tree {
    pub fn n_nodes(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn is_leaf(&self, node: usize) -> bool {
        self.left[node] == LEAF
    }

    /// Child taken by a feature value. Comparison is in f32 like XGBoost.
    #[inline]
    pub fn next_node(&self, node: usize, value: f64) -> usize {
        let go_left = if value.is_nan() {
            self.default_left[node]
        } else {
            (value as f32) < self.threshold[node]
        };
        if go_left {
            self.left[node] as usize
        } else {
            self.right[node] as usize
        }
    }

    /// Leaf reached by a feature row
    pub fn leaf_for(&self, row: &[f64]) -> usize {
        let mut node = 0;
        while !self.is_leaf(node) {
            let feature = self.split_feature[node] as usize;
            node = self.next_node(node, row[feature]);
        }
        node
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.leaf_value[self.leaf_for(row)]
    }

    /// Maximum number of splits on a root-to-leaf path; a lone leaf is 0
    pub fn depth(&self) -> usize {
        fn walk(tree: &Tree, node: usize) -> usize {
            if tree.is_leaf(node) {
                0
            } else {
                1 + walk(tree, tree.left[node] as usize).max(walk(tree, tree.right[node] as usize))
            }
        }
        walk(self, 0)
    }

    /// Cover-weighted mean leaf value
    pub fn expected_value(&self) -> f64 {
        fn walk(tree: &Tree, node: usize) -> f64 {
            if tree.is_leaf(node) {
                return tree.leaf_value[node];
            }
            let (l, r) = (tree.left[node] as usize, tree.right[node] as usize);
            let total = tree.cover[l] + tree.cover[r];
            if total <= 0.0 {
                return 0.5 * (walk(tree, l) + walk(tree, r));
            }
            (tree.cover[l] * walk(tree, l) + tree.cover[r] * walk(tree, r)) / total
        }
        walk(self, 0)
    }

    /// Check array lengths, child indices and split features
    pub fn validate(&self, tree_index: usize, n_features: usize) -> Result<()> {
        let n = self.n_nodes();
        let err = |message: String| {
            AppError::artifact("model", format!("tree {}: {}", tree_index, message))
        };

        if n == 0 {
            return Err(err("no nodes".to_string()));
        }
        for (name, len) in [
            ("right_children", self.right.len()),
            ("split_indices", self.split_feature.len()),
            ("split_conditions", self.threshold.len()),
            ("default_left", self.default_left.len()),
            ("base_weights", self.leaf_value.len()),
            ("sum_hessian", self.cover.len()),
        ] {
            if len != n {
                return Err(err(format!("{} has {} entries, expected {}", name, len, n)));
            }
        }

        for node in 0..n {
            if self.is_leaf(node) {
                continue;
            }
            for child in [self.left[node], self.right[node]] {
                if child <= node as i32 || child as usize >= n {
                    return Err(err(format!(
                        "node {} has invalid child index {}",
                        node, child
                    )));
                }
            }
            if self.split_feature[node] as usize >= n_features {
                return Err(err(format!(
                    "node {} splits on feature {} but the model has {} features",
                    node, self.split_feature[node], n_features
                )));
            }
        }
        Ok(())
    }
}

/// Binary classification tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forest {
    pub trees: Vec<Tree>,

    /// Per-tree output multipliers (1.0 except for DART)
    pub tree_weights: Vec<f64>,

    /// Base score in margin space
    pub base_margin: f64,

    pub n_features: usize,

    pub feature_names: Vec<String>,

    pub objective: Objective,
}

impl Forest {
    pub fn new(
        trees: Vec<Tree>,
        base_margin: f64,
        n_features: usize,
        objective: Objective,
    ) -> Result<Self> {
        let tree_weights = vec![1.0; trees.len()];
        let forest = Self {
            trees,
            tree_weights,
            base_margin,
            n_features,
            feature_names: Vec::new(),
            objective,
        };
        forest.validate()?;
        Ok(forest)
    }

    pub fn with_tree_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.trees.len() {
            return Err(AppError::artifact(
                "model",
                format!(
                    "{} tree weights for {} trees",
                    weights.len(),
                    self.trees.len()
                ),
            ));
        }
        self.tree_weights = weights;
        Ok(self)
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(AppError::artifact("model", "ensemble has no trees"));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, self.n_features)?;
        }
        Ok(())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }

    fn check_row(&self, row: &[f64]) -> Result<()> {
        if row.len() != self.n_features {
            return Err(AppError::Inference(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        Ok(())
    }

    /// Raw log-odds output
    pub fn predict_margin(&self, row: &[f64]) -> Result<f64> {
        self.check_row(row)?;
        Ok(self.margin_unchecked(row))
    }

    fn margin_unchecked(&self, row: &[f64]) -> f64 {
        self.trees
            .iter()
            .zip(&self.tree_weights)
            .fold(self.base_margin, |acc, (tree, w)| acc + w * tree.predict(row))
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        self.predict_margin(row).map(sigmoid)
    }

    /// Probabilities for each row of a feature matrix, computed in parallel
    pub fn predict_proba_batch(&self, rows: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if rows.ncols() != self.n_features {
            return Err(AppError::Inference(format!(
                "expected {} feature columns, got {}",
                self.n_features,
                rows.ncols()
            )));
        }
        Ok(rows
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| sigmoid(self.margin_view(row)))
            .collect())
    }

    fn margin_view(&self, row: ArrayView1<'_, f64>) -> f64 {
        match row.as_slice() {
            Some(slice) => self.margin_unchecked(slice),
            None => self.margin_unchecked(&row.to_vec()),
        }
    }

    /// Expected margin over the training distribution
    pub fn expected_margin(&self) -> f64 {
        self.trees
            .iter()
            .zip(&self.tree_weights)
            .fold(self.base_margin, |acc, (tree, w)| {
                acc + w * tree.expected_value()
            })
    }
}

#[inline]
pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Inverse of the sigmoid, clamped away from 0 and 1
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-7, 1.0 - 1e-7);
    (p / (1.0 - p)).ln()
}
