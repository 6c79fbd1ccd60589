//! Inference adapter: observation in, risk narrative out.
//!
//! The adapter is a pure mapping over a loaded [`ClassifierHandle`]. It encodes the observation
//! in training-time order, asks the classifier for its class and its class probabilities, and
//! turns those into a [`PredictionResult`]. It performs no range validation, no logging and no
//! persistence.

use crate::classifier::ClassifierHandle;
use crate::constants::{HIGH_RISK_ADVISORY, LOW_RISK_ADVISORY};
use crate::error::{InferenceError, InferenceResult};
use crate::observation::{ClinicalObservation, Feature, FEATURE_ORDER};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    High,
}

impl RiskLevel {
    pub fn from_class(class: u8) -> Self {
        if class == 1 {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::High => "High Risk",
        }
    }

    pub fn advisory(self) -> &'static str {
        match self {
            RiskLevel::Low => LOW_RISK_ADVISORY,
            RiskLevel::High => HIGH_RISK_ADVISORY,
        }
    }
}

/// Outcome of one inference request. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PredictionResult {
    /// Class returned by the classifier's decision function.
    pub predicted_class: u8,
    /// Risk label derived from `predicted_class`, not from thresholding `probability`.
    pub risk_label: RiskLevel,
    /// Probability of the positive (disease) class.
    pub probability: f64,
    pub advisory: String,
}

impl PredictionResult {
    /// Whether the decision-function label agrees with a 0.5 threshold on the probability.
    ///
    /// The built-in classifiers always agree; an external classifier might not, in which case
    /// the label still follows the decision function.
    pub fn threshold_agrees(&self) -> bool {
        (self.probability > 0.5) == (self.predicted_class == 1)
    }

    /// Probability formatted as a percentage with one decimal place.
    pub fn probability_percent(&self) -> String {
        format!("{:.1}%", self.probability * 100.0)
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} – Probability: {}",
            self.risk_label.label(),
            self.probability_percent()
        )
    }
}

/// One attribute's weight in the classifier's importance vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeatureImportance {
    pub feature: Feature,
    /// Artifact column name.
    pub column: String,
    pub label: String,
    pub weight: f64,
}

/// Binds a loaded classifier to the observation encoding.
#[derive(Debug, Clone)]
pub struct InferenceAdapter {
    classifier: ClassifierHandle,
}

impl InferenceAdapter {
    pub fn new(classifier: ClassifierHandle) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ClassifierHandle {
        &self.classifier
    }

    /// Run the classifier on one observation.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] if the classifier rejects the vector or returns a class
    /// outside {0, 1} or a probability outside [0, 1]. No partial result is produced.
    pub fn predict(&self, observation: &ClinicalObservation) -> InferenceResult<PredictionResult> {
        let vector = observation.to_feature_vector();

        let class = self.classifier.predict(vector.as_slice())?;
        if class > 1 {
            return Err(InferenceError::InvalidClass(i64::from(class)));
        }

        let [_, probability] = self.classifier.predict_proba(vector.as_slice())?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(InferenceError::InvalidProbability(probability));
        }

        let risk_label = RiskLevel::from_class(class);
        Ok(PredictionResult {
            predicted_class: class,
            risk_label,
            probability,
            advisory: risk_label.advisory().to_string(),
        })
    }

    /// Attributes ranked by the classifier's importance weights, highest first, truncated to
    /// `n`. Equal weights keep feature order. `None` when the classifier exposes no weights.
    pub fn top_features(&self, n: usize) -> Option<Vec<FeatureImportance>> {
        let weights = self.classifier.feature_importances()?;

        let mut ranked: Vec<FeatureImportance> = FEATURE_ORDER
            .iter()
            .zip(weights)
            .map(|(feature, weight)| FeatureImportance {
                feature: *feature,
                column: feature.column().to_string(),
                label: feature.label().to_string(),
                weight: *weight,
            })
            .collect();
        ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        ranked.truncate(n);

        Some(ranked)
    }
}
