//! Exact path-dependent TreeSHAP.
//!
//! Implements Algorithm 2 of Lundberg et al., "Consistent Individualized
//! Feature Attribution for Tree Ensembles" (2018). Values are in margin
//! (log-odds) space and satisfy `expected_value + sum(phi) == margin`.

use crate::error::Result;
use crate::ml::forest::{Forest, Tree};

/// SHAP attributions for one row
#[derive(Debug, Clone, PartialEq)]
pub struct ShapValues {
    /// One value per model feature
    pub values: Vec<f64>,

    /// Expected margin of the ensemble
    pub expected_value: f64,
}

impl ShapValues {
    /// `expected_value + sum(values)`
    pub fn output(&self) -> f64 {
        self.expected_value + self.values.iter().sum::<f64>()
    }

    /// Feature indices ordered by descending absolute attribution
    pub fn ranked(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| {
            self.values[b]
                .abs()
                .partial_cmp(&self.values[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        order
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: i64,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

impl PathElement {
    const EMPTY: PathElement = PathElement {
        feature: -1,
        zero_fraction: 0.0,
        one_fraction: 0.0,
        pweight: 0.0,
    };
}

/// TreeSHAP explainer over a borrowed forest
pub struct TreeExplainer<'a> {
    forest: &'a Forest,
    expected_value: f64,
}

impl<'a> TreeExplainer<'a> {
    pub fn new(forest: &'a Forest) -> Self {
        Self {
            forest,
            expected_value: forest.expected_margin(),
        }
    }

    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    /// Attributions for a single (already scaled) feature row
    pub fn shap_values(&self, row: &[f64]) -> Result<ShapValues> {
        // Validates the row length
        self.forest.predict_margin(row)?;

        let mut phi = vec![0.0; self.forest.n_features];
        for (tree, &weight) in self.forest.trees.iter().zip(&self.forest.tree_weights) {
            recurse(tree, 0, row, weight, &mut phi, &[], 1.0, 1.0, -1);
        }

        Ok(ShapValues {
            values: phi,
            expected_value: self.expected_value,
        })
    }
}

/// Walk one tree. `parent_path` is the unique feature path above `node`.
#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    node: usize,
    row: &[f64],
    scale: f64,
    phi: &mut [f64],
    parent_path: &[PathElement],
    parent_zero_fraction: f64,
    parent_one_fraction: f64,
    parent_feature: i64,
) {
    let mut path = parent_path.to_vec();
    let mut unique_depth = path.len();
    path.push(PathElement::EMPTY);
    extend_path(
        &mut path,
        unique_depth,
        parent_zero_fraction,
        parent_one_fraction,
        parent_feature,
    );

    if tree.is_leaf(node) {
        let leaf = tree.leaf_value[node] * scale;
        for i in 1..=unique_depth {
            let w = unwound_path_sum(&path, unique_depth, i);
            let el = path[i];
            phi[el.feature as usize] += w * (el.one_fraction - el.zero_fraction) * leaf;
        }
        return;
    }

    let split = tree.split_feature[node] as usize;
    let hot = tree.next_node(node, row[split]);
    let cold = if hot == tree.left[node] as usize {
        tree.right[node] as usize
    } else {
        tree.left[node] as usize
    };

    let node_cover = tree.cover[node];
    let (hot_zero, cold_zero) = if node_cover > 0.0 {
        (tree.cover[hot] / node_cover, tree.cover[cold] / node_cover)
    } else {
        (0.5, 0.5)
    };

    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;

    // A feature already on the path is unwound so it appears once
    if let Some(k) = (0..=unique_depth).find(|&k| path[k].feature == split as i64) {
        incoming_zero = path[k].zero_fraction;
        incoming_one = path[k].one_fraction;
        unwind_path(&mut path, unique_depth, k);
        unique_depth -= 1;
    }
    path.truncate(unique_depth + 1);

    recurse(
        tree,
        hot,
        row,
        scale,
        phi,
        &path,
        hot_zero * incoming_zero,
        incoming_one,
        split as i64,
    );
    recurse(
        tree,
        cold,
        row,
        scale,
        phi,
        &path,
        cold_zero * incoming_zero,
        0.0,
        split as i64,
    );
}

fn extend_path(
    path: &mut [PathElement],
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: i64,
) {
    path[unique_depth] = PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if unique_depth == 0 { 1.0 } else { 0.0 },
    };
    let d = unique_depth as f64;
    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        path[i + 1].pweight += one_fraction * path[i].pweight * (fi + 1.0) / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - fi) / (d + 1.0);
    }
}

fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let d = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (d - fi) / (d + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero_fraction * (d - fi));
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
    let d = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((d - fi) / (d + 1.0));
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((d - fi) / (d + 1.0));
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::forest::tests::sample_tree;
    use crate::ml::forest::{Objective, LEAF};

    /// Path-dependent conditional expectation E[f(x) | x_S]
    fn cond_expectation(tree: &Tree, node: usize, row: &[f64], subset: &[bool]) -> f64 {
        if tree.is_leaf(node) {
            return tree.leaf_value[node];
        }
        let feature = tree.split_feature[node] as usize;
        if subset[feature] {
            return cond_expectation(tree, tree.next_node(node, row[feature]), row, subset);
        }
        let (l, r) = (tree.left[node] as usize, tree.right[node] as usize);
        (tree.cover[l] * cond_expectation(tree, l, row, subset)
            + tree.cover[r] * cond_expectation(tree, r, row, subset))
            / tree.cover[node]
    }

    fn forest_value(forest: &Forest, row: &[f64], subset: &[bool]) -> f64 {
        forest
            .trees
            .iter()
            .zip(&forest.tree_weights)
            .map(|(t, w)| w * cond_expectation(t, 0, row, subset))
            .sum::<f64>()
            + forest.base_margin
    }

    fn factorial(n: usize) -> f64 {
        (1..=n).map(|k| k as f64).product()
    }

    /// Shapley values by enumerating every coalition
    fn brute_force(forest: &Forest, row: &[f64]) -> Vec<f64> {
        let m = forest.n_features;
        let mut phi = vec![0.0; m];
        for i in 0..m {
            for mask in 0u32..(1 << m) {
                if mask & (1 << i) != 0 {
                    continue;
                }
                let subset: Vec<bool> = (0..m).map(|j| mask & (1 << j) != 0).collect();
                let mut with_i = subset.clone();
                with_i[i] = true;
                let s = mask.count_ones() as usize;
                let weight = factorial(s) * factorial(m - s - 1) / factorial(m);
                phi[i] += weight
                    * (forest_value(forest, row, &with_i) - forest_value(forest, row, &subset));
            }
        }
        phi
    }

    /// Depth-3 tree that splits on feature 0 twice along one path
    fn repeated_feature_tree() -> Tree {
        Tree {
            left: vec![1, 3, 5, LEAF, LEAF, LEAF, LEAF],
            right: vec![2, 4, 6, LEAF, LEAF, LEAF, LEAF],
            split_feature: vec![0, 0, 2, 0, 0, 0, 0],
            threshold: vec![0.5, 0.2, 1.0, 0.0, 0.0, 0.0, 0.0],
            default_left: vec![true; 7],
            leaf_value: vec![0.0, 0.0, 0.0, -0.3, 0.2, 0.4, 0.9],
            cover: vec![80.0, 50.0, 30.0, 20.0, 30.0, 10.0, 20.0],
        }
    }

    fn test_forest() -> Forest {
        Forest::new(
            vec![sample_tree(), repeated_feature_tree()],
            -0.1,
            3,
            Objective::BinaryLogistic,
        )
        .unwrap()
        .with_tree_weights(vec![1.0, 0.8])
        .unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_local_accuracy() {
        let forest = test_forest();
        let explainer = TreeExplainer::new(&forest);
        for row in [[0.1, 3.0, 2.0], [0.3, 1.0, 0.0], [0.9, 2.0, 5.0]] {
            let shap = explainer.shap_values(&row).unwrap();
            assert_close(shap.output(), forest.predict_margin(&row).unwrap());
        }
    }

    #[test]
    fn test_matches_brute_force_shapley_values() {
        let forest = test_forest();
        let explainer = TreeExplainer::new(&forest);
        for row in [[0.1, 3.0, 2.0], [0.3, 1.0, 0.0], [0.9, 2.0, 5.0]] {
            let shap = explainer.shap_values(&row).unwrap();
            let expected = brute_force(&forest, &row);
            for (got, want) in shap.values.iter().zip(expected) {
                assert_close(*got, want);
            }
        }
    }

    #[test]
    fn test_single_split_attribution() {
        // One split on f0: phi_0 = leaf(x) - E[leaf]
        let tree = Tree {
            left: vec![1, LEAF, LEAF],
            right: vec![2, LEAF, LEAF],
            split_feature: vec![0, 0, 0],
            threshold: vec![0.5, 0.0, 0.0],
            default_left: vec![true; 3],
            leaf_value: vec![0.0, -1.0, 1.0],
            cover: vec![100.0, 50.0, 50.0],
        };
        let forest = Forest::new(vec![tree], 0.0, 2, Objective::BinaryLogistic).unwrap();
        let shap = TreeExplainer::new(&forest).shap_values(&[0.3, 7.0]).unwrap();
        assert_close(shap.expected_value, 0.0);
        assert_close(shap.values[0], -1.0);
        assert_close(shap.values[1], 0.0);
    }

    #[test]
    fn test_unused_feature_gets_zero() {
        let forest = Forest::new(vec![sample_tree()], 0.0, 3, Objective::BinaryLogistic).unwrap();
        let shap = TreeExplainer::new(&forest)
            .shap_values(&[0.0, 1.0, 42.0])
            .unwrap();
        assert_eq!(shap.values[2], 0.0);
    }

    #[test]
    fn test_ranked_by_magnitude() {
        let shap = ShapValues {
            values: vec![0.1, -0.7, 0.3, 0.0],
            expected_value: 0.0,
        };
        assert_eq!(shap.ranked(), vec![1, 2, 0, 3]);
    }
}
