//! Confidence scoring against an offline-trained classifier.
//!
//! The classifier is a seam: anything that maps a [`FeatureRow`] to a
//! probability per label can drive the gate. [`ForestClassifier`] reads a
//! tree ensemble exported to JSON.

use crate::indicators::FeatureRow;
use log::{error, info, warn};
use ndarray::Array1;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("prediction failed: {0}")]
    Prediction(String),
}

/// Predicted label and the probability of every label, aligned with
/// [`Classifier::labels`].
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub probabilities: Vec<f64>,
}

pub trait Classifier {
    fn labels(&self) -> Vec<String>;

    fn predict(&self, features: &FeatureRow) -> Result<Prediction, ClassifierError>;
}

/// Outcome of one pass through the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierResult {
    pub confidence: f64,
    pub labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ForestModel {
    labels: Vec<String>,
    #[serde(default = "default_feature_names")]
    features: Vec<String>,
    trees: Vec<TreeModel>,
}

#[derive(Debug, Deserialize)]
struct TreeModel {
    nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

fn default_feature_names() -> Vec<String> {
    FeatureRow::NAMES.iter().map(|s| s.to_string()).collect()
}

/// Random-forest style ensemble: each tree votes a class distribution, the
/// forest averages them.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    labels: Vec<String>,
    /// Position in `FeatureRow::to_array()` for each model feature.
    feature_map: Vec<usize>,
    trees: Vec<Vec<TreeNode>>,
}

impl ForestClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        let model: ForestModel = serde_json::from_str(raw)?;
        Self::from_model(model)
    }

    fn from_model(model: ForestModel) -> Result<Self, ClassifierError> {
        if model.labels.is_empty() {
            return Err(ClassifierError::InvalidModel("no labels".into()));
        }
        if model.trees.is_empty() {
            return Err(ClassifierError::InvalidModel("no trees".into()));
        }

        let feature_map = model
            .features
            .iter()
            .map(|name| {
                FeatureRow::NAMES
                    .iter()
                    .position(|known| known == name)
                    .ok_or_else(|| ClassifierError::InvalidModel(format!("unknown feature '{name}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (t, tree) in model.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ClassifierError::InvalidModel(format!("tree {t} has no nodes")));
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= feature_map.len() {
                            return Err(ClassifierError::InvalidModel(format!(
                                "tree {t} node {n}: feature index {feature} out of range"
                            )));
                        }
                        if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                            return Err(ClassifierError::InvalidModel(format!(
                                "tree {t} node {n}: child index out of range"
                            )));
                        }
                    }
                    TreeNode::Leaf { value } => {
                        if value.len() != model.labels.len() {
                            return Err(ClassifierError::InvalidModel(format!(
                                "tree {t} node {n}: {} leaf values for {} labels",
                                value.len(),
                                model.labels.len()
                            )));
                        }
                        if value.iter().any(|v| *v < 0.0) || value.iter().sum::<f64>() <= 0.0 {
                            return Err(ClassifierError::InvalidModel(format!(
                                "tree {t} node {n}: leaf weights must be non-negative with positive sum"
                            )));
                        }
                    }
                }
            }
        }

        Ok(Self {
            labels: model.labels,
            feature_map,
            trees: model.trees.into_iter().map(|t| t.nodes).collect(),
        })
    }

    fn tree_distribution(&self, nodes: &[TreeNode], x: &[f64]) -> Result<Array1<f64>, ClassifierError> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..=nodes.len() {
            match &nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => {
                    let leaf = Array1::from(value.clone());
                    let total = leaf.sum();
                    return Ok(leaf / total);
                }
            }
        }
        Err(ClassifierError::Prediction("cycle detected in tree".into()))
    }
}

impl Classifier for ForestClassifier {
    fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn predict(&self, features: &FeatureRow) -> Result<Prediction, ClassifierError> {
        let row = features.to_array();
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::Prediction(format!("non-finite features: {row:?}")));
        }
        let x: Vec<f64> = self.feature_map.iter().map(|&i| row[i]).collect();

        let mut total = Array1::<f64>::zeros(self.labels.len());
        for nodes in &self.trees {
            total += &self.tree_distribution(nodes, &x)?;
        }
        let probabilities = total / self.trees.len() as f64;

        let best = probabilities
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if *p > probabilities[best] { i } else { best });

        Ok(Prediction {
            label: self.labels[best].clone(),
            probabilities: probabilities.to_vec(),
        })
    }
}

/// Turns classifier output into one scalar confidence.
///
/// Fails closed: no model, or any error while predicting, scores 0.
pub struct ConfidenceGate {
    classifier: Option<Box<dyn Classifier>>,
    favorable_index: Option<usize>,
    labels: Vec<String>,
}

impl ConfidenceGate {
    pub fn new(classifier: Box<dyn Classifier>, favorable_label: &str) -> Self {
        let labels = classifier.labels();
        let favorable_index = labels.iter().position(|l| l == favorable_label);
        match favorable_index {
            Some(_) => info!("Confidence gate scoring label '{}' of {:?}", favorable_label, labels),
            None => warn!(
                "Favorable label '{}' not in classifier labels {:?}; using max probability",
                favorable_label, labels
            ),
        }
        Self {
            classifier: Some(classifier),
            favorable_index,
            labels,
        }
    }

    /// A gate that always scores 0.
    pub fn disabled() -> Self {
        Self {
            classifier: None,
            favorable_index: None,
            labels: Vec::new(),
        }
    }

    /// Load a [`ForestClassifier`] from disk, degrading to [`Self::disabled`]
    /// when the file is missing or invalid.
    pub fn load(path: impl AsRef<Path>, favorable_label: &str) -> Self {
        let path = path.as_ref();
        match ForestClassifier::load(path) {
            Ok(model) => {
                info!("Classifier loaded from {}", path.display());
                Self::new(Box::new(model), favorable_label)
            }
            Err(e) => {
                error!("Error loading classifier: {}. Confidence fixed at 0", e);
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn evaluate(&self, features: &FeatureRow) -> ClassifierResult {
        let confidence = match &self.classifier {
            Some(classifier) => match classifier.predict(features) {
                Ok(prediction) => self.extract_confidence(&prediction),
                Err(e) => {
                    error!("Classifier error: {}", e);
                    0.0
                }
            },
            None => 0.0,
        };
        ClassifierResult {
            confidence,
            labels: self.labels.clone(),
        }
    }

    pub fn confidence(&self, features: &FeatureRow) -> f64 {
        self.evaluate(features).confidence
    }

    fn extract_confidence(&self, prediction: &Prediction) -> f64 {
        let raw = match self.favorable_index {
            Some(i) => prediction.probabilities.get(i).copied(),
            None => prediction
                .probabilities
                .iter()
                .copied()
                .fold(None, |best: Option<f64>, p| Some(best.map_or(p, |b| b.max(p)))),
        };
        match raw {
            Some(p) if p.is_finite() => p.clamp(0.0, 1.0),
            _ => {
                error!("Classifier returned unusable probabilities: {:?}", prediction.probabilities);
                0.0
            }
        }
    }
}
