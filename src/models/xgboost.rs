//! Native evaluator for XGBoost JSON model artifacts.
//!
//! Reads the JSON document written by `Booster.save_model("*.json")` and
//! evaluates its gradient-boosted tree ensemble directly, so the trained
//! artifact can be served without the XGBoost runtime. Only binary
//! classification with the `gbtree` booster is supported.

use crate::models::classifier::Classifier;
use crate::types::FeatureMatrix;
use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Probability above which the classifier labels a row as fraud
const DECISION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Deserialize)]
struct ModelDocument {
    learner: LearnerDocument,
}

#[derive(Debug, Deserialize)]
struct LearnerDocument {
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    feature_names: Vec<String>,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveDocument,
    gradient_booster: BoosterDocument,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectiveDocument {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BoosterDocument {
    name: String,
    #[serde(default)]
    model: Option<GbTreeDocument>,
}

#[derive(Debug, Deserialize)]
struct GbTreeDocument {
    #[serde(default)]
    gbtree_model_param: HashMap<String, String>,
    trees: Vec<TreeDocument>,
}

#[derive(Debug, Deserialize)]
struct TreeDocument {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<i64>,
}

/// `default_left` is written as 0/1 integers by most releases and as
/// booleans by a few.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

/// How the raw margin maps to a probability
#[derive(Debug, Clone, Copy, PartialEq)]
enum Objective {
    /// `base_score` is a probability; output passes through the sigmoid
    Logistic,
    /// `base_score` is already a margin
    LogitRaw,
}

/// One regression tree in flat array form
#[derive(Debug, Clone)]
struct Tree {
    left: Vec<i64>,
    right: Vec<i64>,
    split_index: Vec<usize>,
    split_condition: Vec<f32>,
    default_left: Vec<bool>,
}

impl Tree {
    /// Validate node arrays against `num_features`.
    ///
    /// Children must point forward, which rules out cycles and keeps
    /// traversal bounded by the node count.
    fn from_document(doc: TreeDocument, num_features: usize) -> Result<Self> {
        let n = doc.left_children.len();
        ensure!(n > 0, "tree has no nodes");
        ensure!(
            doc.right_children.len() == n
                && doc.split_indices.len() == n
                && doc.split_conditions.len() == n
                && doc.default_left.len() == n,
            "tree node arrays have inconsistent lengths"
        );
        if doc.split_type.iter().any(|&t| t != 0) {
            bail!("categorical splits are not supported");
        }

        let mut split_index = Vec::with_capacity(n);
        for node in 0..n {
            let left = doc.left_children[node];
            let right = doc.right_children[node];
            let is_leaf = left < 0;
            if is_leaf {
                split_index.push(0);
                continue;
            }
            let in_range = |child: i64| child > node as i64 && (child as usize) < n;
            ensure!(
                in_range(left) && in_range(right),
                "node {} has out-of-order children ({}, {})",
                node,
                left,
                right
            );
            let feature = doc.split_indices[node];
            ensure!(
                feature >= 0 && (feature as usize) < num_features,
                "node {} splits on feature {} but the model has {} features",
                node,
                feature,
                num_features
            );
            split_index.push(feature as usize);
        }

        Ok(Self {
            left: doc.left_children,
            right: doc.right_children,
            split_index,
            split_condition: doc.split_conditions,
            default_left: doc.default_left.into_iter().map(Flag::is_set).collect(),
        })
    }

    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut node = 0usize;
        loop {
            let left = self.left[node];
            if left < 0 {
                return self.split_condition[node];
            }
            let value = row[self.split_index[node]];
            let go_left = if value.is_nan() {
                self.default_left[node]
            } else {
                value < self.split_condition[node]
            };
            let next = if go_left { left } else { self.right[node] };
            node = next as usize;
        }
    }
}

/// Gradient-boosted tree ensemble loaded from XGBoost JSON
#[derive(Debug, Clone)]
pub struct XgboostModel {
    name: String,
    feature_names: Vec<String>,
    objective: Objective,
    base_margin: f32,
    trees: Vec<Tree>,
}

impl XgboostModel {
    /// Parse a model document.
    ///
    /// `feature_names` replaces the names stored in the document when given;
    /// a model without names from either source is rejected.
    pub fn from_json_str(
        json: &str,
        name: &str,
        feature_names: Option<Vec<String>>,
    ) -> Result<Self> {
        let doc: ModelDocument =
            serde_json::from_str(json).context("Failed to parse XGBoost model JSON")?;
        let learner = doc.learner;

        let feature_names = match feature_names {
            Some(names) => names,
            None => learner.feature_names,
        };
        ensure!(
            !feature_names.is_empty(),
            "model carries no feature names; supply a feature_info file"
        );

        if let Some(declared) = learner
            .learner_model_param
            .num_feature
            .as_deref()
            .and_then(|n| n.parse::<usize>().ok())
        {
            ensure!(
                declared == feature_names.len(),
                "model declares {} features but {} feature names were given",
                declared,
                feature_names.len()
            );
        }

        let num_class = learner
            .learner_model_param
            .num_class
            .as_deref()
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        ensure!(num_class <= 1, "multi-class models are not supported (num_class = {})", num_class);

        let objective = match learner.objective.name.as_str() {
            "binary:logistic" => Objective::Logistic,
            "binary:logitraw" => Objective::LogitRaw,
            other => bail!("unsupported objective '{}'", other),
        };

        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        let base_margin = match objective {
            Objective::Logistic => {
                ensure!(
                    base_score > 0.0 && base_score < 1.0,
                    "base_score {} is not a probability",
                    base_score
                );
                (base_score / (1.0 - base_score)).ln()
            }
            Objective::LogitRaw => base_score,
        };

        ensure!(
            learner.gradient_booster.name == "gbtree",
            "unsupported booster '{}'",
            learner.gradient_booster.name
        );
        let booster = learner
            .gradient_booster
            .model
            .context("gbtree booster has no model section")?;

        let mut trees = booster
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                Tree::from_document(t, feature_names.len()).with_context(|| format!("tree {}", i))
            })
            .collect::<Result<Vec<Tree>>>()?;

        // Early-stopped models predict with the trees up to the best round only.
        if let Some(best) = learner
            .attributes
            .get("best_iteration")
            .and_then(|b| b.parse::<usize>().ok())
        {
            let per_round = booster
                .gbtree_model_param
                .get("num_parallel_tree")
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            let keep = (best + 1).saturating_mul(per_round);
            if keep < trees.len() {
                debug!(best_iteration = best, trees = keep, "Truncating to best iteration");
                trees.truncate(keep);
            }
        }

        info!(
            model = %name,
            trees = trees.len(),
            features = feature_names.len(),
            objective = %learner.objective.name,
            "XGBoost model parsed"
        );

        Ok(Self {
            name: name.to_string(),
            feature_names,
            objective,
            base_margin,
            trees,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn margin(&self, row: &[f32]) -> f32 {
        self.trees
            .iter()
            .fold(self.base_margin, |acc, tree| acc + tree.leaf_value(row))
    }

    fn check_width(&self, features: &FeatureMatrix) -> Result<()> {
        ensure!(
            features.cols() == self.feature_names.len(),
            "expected {} feature columns, got {}",
            self.feature_names.len(),
            features.cols()
        );
        Ok(())
    }
}

impl Classifier for XgboostModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>> {
        let probabilities = self.predict_probability(features)?;
        Ok(probabilities
            .into_iter()
            .map(|p| i64::from(p as f32 > DECISION_THRESHOLD))
            .collect())
    }

    fn predict_probability(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        self.check_width(features)?;
        Ok(features
            .iter_rows()
            .map(|row| sigmoid(self.margin(row)) as f64)
            .collect())
    }
}

/// `base_score` is written as `"5E-1"` or, by newer releases, `"[5E-1]"`.
fn parse_base_score(raw: &str) -> Result<f32> {
    let first = raw
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .next()
        .unwrap_or_default()
        .trim();
    first
        .parse::<f32>()
        .with_context(|| format!("invalid base_score '{}'", raw))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
