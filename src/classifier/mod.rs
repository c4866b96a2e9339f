//! Independent pass/fail predictions used to cross-check verdicts.
//!
//! A model is a forest of decision trees stored as YAML:
//!
//! ```yaml
//! trees:
//!   - feature: Std Dev
//!     threshold: 0.1
//!     below: { leaf: true }
//!     above:
//!       feature: 4xx
//!       threshold: 0.5
//!       below: { leaf: true }
//!       above: { leaf: false }
//! ```
//!
//! A split sends a row `below` when the feature value is less than or equal to
//! the threshold, `above` otherwise. The forest predicts by majority vote.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ProbeError, Result};
use crate::report::{FEATURE_NAMES, FeatureRow};

pub trait Classifier: Send + Sync {
    /// `true` when the model expects the assessment to pass.
    fn predict(&self, row: &FeatureRow) -> Result<bool>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Leaf {
        leaf: bool,
    },
    Split {
        feature: String,
        threshold: f64,
        below: Box<Node>,
        above: Box<Node>,
    },
}

impl Node {
    fn validate(&self) -> Result<()> {
        match self {
            Node::Leaf { .. } => Ok(()),
            Node::Split {
                feature,
                threshold,
                below,
                above,
            } => {
                if !FEATURE_NAMES.contains(&feature.as_str()) {
                    return Err(ProbeError::Classifier(format!(
                        "unknown feature '{feature}'"
                    )));
                }
                if !threshold.is_finite() {
                    return Err(ProbeError::Classifier(format!(
                        "threshold for '{feature}' is not a finite number"
                    )));
                }
                below.validate()?;
                above.validate()
            }
        }
    }

    fn decide(&self, row: &FeatureRow) -> Result<bool> {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { leaf } => return Ok(*leaf),
                Node::Split {
                    feature,
                    threshold,
                    below,
                    above,
                } => {
                    let value = row.feature(feature).ok_or_else(|| {
                        ProbeError::Classifier(format!("row has no feature '{feature}'"))
                    })?;
                    node = if value <= *threshold { below } else { above };
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForestClassifier {
    trees: Vec<Node>,
}

impl ForestClassifier {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let forest: ForestClassifier = serde_yaml::from_str(raw)
            .map_err(|e| ProbeError::Classifier(format!("malformed model: {e}")))?;
        if forest.trees.is_empty() {
            return Err(ProbeError::Classifier("model has no trees".to_string()));
        }
        for tree in &forest.trees {
            tree.validate()?;
        }
        Ok(forest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let forest = Self::from_yaml(&raw)?;
        log::info!(
            "Loaded classifier with {} trees from {}",
            forest.trees.len(),
            path.display()
        );
        Ok(forest)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for ForestClassifier {
    fn predict(&self, row: &FeatureRow) -> Result<bool> {
        let mut votes = 0;
        for tree in &self.trees {
            if tree.decide(row)? {
                votes += 1;
            }
        }
        // a tie does not pass
        Ok(votes * 2 > self.trees.len())
    }
}
