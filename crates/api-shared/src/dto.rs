//! Request and response bodies for the JSON API.

use cardio_core::{FeatureImportance, PredictionResult, RiskLevel};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub model_loaded: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PredictRes {
    pub risk_label: RiskLevel,
    pub predicted_class: u8,
    pub probability: f64,
    /// Probability rendered as a percentage, e.g. `66.7%`.
    pub probability_percent: String,
    /// One-line summary, e.g. `High Risk – Probability: 66.7%`.
    pub summary: String,
    pub advisory: String,
    /// Highest-weighted attributes, when the model exposes importances.
    pub top_features: Option<Vec<FeatureImportance>>,
}

impl PredictRes {
    pub fn new(result: &PredictionResult, top_features: Option<Vec<FeatureImportance>>) -> Self {
        Self {
            risk_label: result.risk_label,
            predicted_class: result.predicted_class,
            probability: result.probability,
            probability_percent: result.probability_percent(),
            summary: result.to_string(),
            advisory: result.advisory.clone(),
            top_features,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ModelInfoRes {
    pub kind: String,
    pub source: String,
    /// Artifact column names in the order the model consumes them.
    pub feature_order: Vec<String>,
    pub major_vessels_max: u8,
    pub top_features: Option<Vec<FeatureImportance>>,
}

/// Error body for the JSON API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// `model_unavailable` for fatal load failures, `inference_failed` for per-request failures.
    pub error: String,
    pub message: String,
}

impl ErrorRes {
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self {
            error: "model_unavailable".into(),
            message: message.into(),
        }
    }

    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self {
            error: "inference_failed".into(),
            message: message.into(),
        }
    }
}
