//! Constants used throughout the cardio core crate.
//!
//! Artifact column names, defaults and advisory wording live here so the encoding contract and
//! the rendered narrative stay consistent across the REST and CLI surfaces.

/// Number of attributes in a clinical observation and elements in a feature vector.
pub const FEATURE_COUNT: usize = 13;

/// Artifact column names in training-time order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// Artifact envelope version understood by the loader.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Default artifact location when no source is configured.
pub const DEFAULT_MODEL_SOURCE: &str = "models/final_heart_disease_model.json";

/// Default number of ranked features shown alongside a prediction.
pub const DEFAULT_TOP_FEATURES: usize = 5;

/// Accepted values for the upper bound of the `major_vessels` attribute.
pub const SUPPORTED_MAJOR_VESSELS_MAX: [u8; 2] = [3, 4];

pub const HIGH_RISK_ADVISORY: &str = "Patient likely has heart disease. Recommend clinical review.";

pub const LOW_RISK_ADVISORY: &str = "Patient likely does NOT have heart disease.";

pub const EDUCATIONAL_DISCLAIMER: &str = "Machine learning model for educational purposes only.";
