//! Classifier capability and the built-in model kinds.
//!
//! The rest of the crate only sees [`Classifier`]; the concrete kinds below are what the JSON
//! artifact formats deserialize into. Both follow the usual fitted-estimator conventions:
//! `predict` yields a class in {0, 1} and `predict_proba` yields `[P(0), P(1)]`.

use crate::error::{InferenceError, InferenceResult};
use std::fmt::Debug;
use std::sync::Arc;

/// A fitted binary classifier.
pub trait Classifier: Send + Sync + Debug {
    /// Short identifier of the model kind (`random_forest`, `logistic_regression`, ...).
    fn kind(&self) -> &str;

    /// Number of input columns the classifier was fitted on.
    fn n_features(&self) -> usize;

    /// Predicted class, 0 or 1.
    fn predict(&self, features: &[f64]) -> InferenceResult<u8>;

    /// Class probabilities `[P(0), P(1)]`.
    fn predict_proba(&self, features: &[f64]) -> InferenceResult<[f64; 2]>;

    /// Per-feature importance weights aligned with the input columns, if the model exposes them.
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }
}

/// Shared, immutable handle to a loaded classifier.
pub type ClassifierHandle = Arc<dyn Classifier>;

fn check_dimension(expected: usize, features: &[f64]) -> InferenceResult<()> {
    if features.len() != expected {
        return Err(InferenceError::DimensionMismatch {
            expected,
            found: features.len(),
        });
    }
    Ok(())
}

/// Binary logistic regression: `P(1) = sigmoid(w . x + b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticRegression {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn decision_function(&self, features: &[f64]) -> InferenceResult<f64> {
        check_dimension(self.coefficients.len(), features)?;
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum();
        Ok(dot + self.intercept)
    }
}

fn sigmoid(z: f64) -> f64 {
    // Split on sign so exp() never overflows.
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> &str {
        "logistic_regression"
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> InferenceResult<u8> {
        let [_, p1] = self.predict_proba(features)?;
        Ok(u8::from(p1 > 0.5))
    }

    fn predict_proba(&self, features: &[f64]) -> InferenceResult<[f64; 2]> {
        let p = sigmoid(self.decision_function(features)?);
        Ok([1.0 - p, p])
    }
}

/// Node of a fitted decision tree, stored in a flat array.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// Go to `left` when `x[feature] <= threshold`, otherwise to `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Normalized class distribution `[P(0), P(1)]`.
    Leaf { distribution: [f64; 2] },
}

/// A decision tree whose root is node 0. Child indices always point forward, so traversal
/// terminates.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn leaf_distribution(&self, features: &[f64]) -> InferenceResult<[f64; 2]> {
        let mut index = 0;
        // Each step moves strictly forward, so the walk is bounded by the node count.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { distribution }) => return Ok(*distribution),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).ok_or_else(|| {
                        InferenceError::Evaluation(format!(
                            "split on feature {feature} outside input of length {}",
                            features.len()
                        ))
                    })?;
                    index = if *value <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(InferenceError::Evaluation(format!(
                        "tree node {index} does not exist"
                    )))
                }
            }
        }
        Err(InferenceError::Evaluation(
            "tree traversal did not reach a leaf".into(),
        ))
    }
}

/// Averaging ensemble of decision trees.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Option<Vec<f64>>,
}

impl RandomForest {
    pub fn new(
        n_features: usize,
        trees: Vec<DecisionTree>,
        feature_importances: Option<Vec<f64>>,
    ) -> Self {
        Self {
            n_features,
            trees,
            feature_importances,
        }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> &str {
        "random_forest"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> InferenceResult<u8> {
        let [_, p1] = self.predict_proba(features)?;
        // Ties go to the first class.
        Ok(u8::from(p1 > 0.5))
    }

    fn predict_proba(&self, features: &[f64]) -> InferenceResult<[f64; 2]> {
        check_dimension(self.n_features, features)?;
        if self.trees.is_empty() {
            return Err(InferenceError::Evaluation("forest has no trees".into()));
        }

        let mut sum = 0.0;
        for tree in &self.trees {
            let [_, d1] = tree.leaf_distribution(features)?;
            sum += d1;
        }
        let p1 = sum / self.trees.len() as f64;
        Ok([1.0 - p1, p1])
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances.as_deref()
    }
}
