//! XGBoost JSON model loader.
//!
//! Parses the JSON written by `Booster.save_model("model.json")` (XGBoost >= 1.6)
//! and converts binary classification tree boosters into a native [`Forest`].

use crate::error::{AppError, Result};
use crate::ml::forest::{logit, Forest, Objective, Tree};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::path::Path;

/// `base_score` appears as a number, a string, an array or a bracketed string like "[5E-1]"
fn deserialize_base_score<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    let mut cur = Value::deserialize(deserializer)?;
    loop {
        match cur {
            Value::Number(n) => {
                return n
                    .as_f64()
                    .ok_or_else(|| SerdeError::custom("invalid base_score number"));
            }
            Value::String(s) => {
                let t = s.trim();
                if let Ok(f) = t.parse::<f64>() {
                    return Ok(f);
                }
                if let Some(inner) = t.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                    if let Ok(f) = inner.trim().parse::<f64>() {
                        return Ok(f);
                    }
                }
                match serde_json::from_str::<Vec<Value>>(t) {
                    Ok(arr) => match arr.into_iter().next() {
                        Some(first) => cur = first,
                        None => return Err(SerdeError::custom("empty base_score array")),
                    },
                    Err(_) => {
                        return Err(SerdeError::custom(format!(
                            "cannot parse base_score from '{}'",
                            s
                        )))
                    }
                }
            }
            Value::Array(arr) => match arr.into_iter().next() {
                Some(first) => cur = first,
                None => return Err(SerdeError::custom("empty base_score array")),
            },
            _ => {
                return Err(SerdeError::custom(
                    "base_score must be a number, string or array",
                ))
            }
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct TreeParam {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub num_nodes: i64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub num_feature: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbTree {
    pub tree_param: TreeParam,
    #[serde(default)]
    pub id: i32,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i64>,
    pub split_conditions: Vec<f32>,
    pub base_weights: Vec<f32>,
    pub default_left: Vec<i32>,
    #[serde(default)]
    pub sum_hessian: Vec<f64>,
    #[serde(default)]
    pub split_type: Vec<i32>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct GbTreeModelParam {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub num_trees: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<XgbTree>,
    #[serde(default)]
    pub tree_info: Vec<i32>,
    pub gbtree_model_param: GbTreeModelParam,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DartInner {
    pub model: ModelTrees,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree { model: ModelTrees },
    Dart { gbtree: DartInner, weight_drop: Vec<f64> },
    Gblinear { model: Value },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveSpec {
    pub name: String,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    pub base_score: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub num_class: i64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub num_feature: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Learner {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub gradient_booster: GradientBooster,
    pub objective: ObjectiveSpec,
    pub learner_model_param: LearnerModelParam,
}

/// Top-level XGBoost JSON document
#[derive(Debug, Clone, Deserialize)]
pub struct XgbModel {
    #[serde(default)]
    pub version: Vec<u32>,
    pub learner: Learner,
}

impl XgbModel {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::artifact(path.display().to_string(), e.to_string())
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| AppError::artifact("model", e.to_string()))
    }

    /// Version string like "2.0.3"
    pub fn version_string(&self) -> String {
        if self.version.is_empty() {
            return "unknown".to_string();
        }
        self.version
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    fn objective(&self) -> Result<Objective> {
        match self.learner.objective.name.as_str() {
            "binary:logistic" => Ok(Objective::BinaryLogistic),
            "binary:logitraw" => Ok(Objective::BinaryLogitRaw),
            other => Err(AppError::artifact(
                "model",
                format!("unsupported objective '{}'", other),
            )),
        }
    }

    /// Convert to a native forest
    pub fn to_forest(&self) -> Result<Forest> {
        let objective = self.objective()?;
        let param = &self.learner.learner_model_param;
        if param.num_class > 1 {
            return Err(AppError::artifact(
                "model",
                format!("multi-class models are not supported (num_class = {})", param.num_class),
            ));
        }

        let (model, weights) = match &self.learner.gradient_booster {
            GradientBooster::Gbtree { model } => (model, None),
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => (&gbtree.model, Some(weight_drop.clone())),
            GradientBooster::Gblinear { .. } => {
                return Err(AppError::artifact(
                    "model",
                    "gblinear boosters are not supported",
                ))
            }
        };

        if model.trees.len() as i64 != model.gbtree_model_param.num_trees {
            return Err(AppError::artifact(
                "model",
                format!(
                    "num_trees is {} but {} trees are present",
                    model.gbtree_model_param.num_trees,
                    model.trees.len()
                ),
            ));
        }
        if model.tree_info.iter().any(|&group| group != 0) {
            return Err(AppError::artifact(
                "model",
                "trees for more than one output group",
            ));
        }

        let trees = model
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| convert_tree(t, i))
            .collect::<Result<Vec<_>>>()?;

        let base_margin = match objective {
            Objective::BinaryLogistic => logit(param.base_score),
            Objective::BinaryLogitRaw => param.base_score,
        };

        let n_features = param.num_feature.max(0) as usize;
        let mut forest = Forest::new(trees, base_margin, n_features, objective)?
            .with_feature_names(self.learner.feature_names.clone());
        if let Some(weights) = weights {
            forest = forest.with_tree_weights(weights)?;
        }
        Ok(forest)
    }
}

fn convert_tree(tree: &XgbTree, index: usize) -> Result<Tree> {
    let n = tree.tree_param.num_nodes.max(0) as usize;
    let err = |message: String| AppError::artifact("model", format!("tree {}: {}", index, message));

    if tree.left_children.len() != n {
        return Err(err(format!(
            "num_nodes is {} but {} left children are present",
            n,
            tree.left_children.len()
        )));
    }
    if tree.split_type.iter().any(|&t| t != 0) {
        return Err(err("categorical splits are not supported".to_string()));
    }
    if tree.sum_hessian.len() != n {
        return Err(err(
            "sum_hessian is missing; covers are required for explanations".to_string(),
        ));
    }

    let split_feature = tree
        .split_indices
        .iter()
        .map(|&f| {
            u32::try_from(f).map_err(|_| err(format!("negative split index {}", f)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Tree {
        left: tree.left_children.clone(),
        right: tree.right_children.clone(),
        split_feature,
        threshold: tree.split_conditions.clone(),
        default_left: tree.default_left.iter().map(|&d| d != 0).collect(),
        leaf_value: tree.base_weights.iter().map(|&w| w as f64).collect(),
        cover: tree.sum_hessian.clone(),
    })
}
