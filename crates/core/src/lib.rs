//! # Cardio Core
//!
//! Core logic for the heart disease risk predictor.
//!
//! This crate contains the inference binding and nothing else:
//! - The clinical observation record and its canonical feature-vector encoding
//! - The classifier capability and the JSON artifact formats that implement it
//! - Artifact loading from a local path or remote URL, memoized for the process lifetime
//! - The inference adapter mapping classifier output to a risk narrative
//! - The input form schema
//!
//! **No API concerns**: HTTP handlers, HTML rendering and CLI parsing belong in `api-rest`,
//! `api-shared` and `cardio-cli`.

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod inference;
pub mod loader;
pub mod observation;
pub mod schema;

pub use classifier::{Classifier, ClassifierHandle};
pub use config::{ArtifactSource, CoreConfig, EncodingProfile};
pub use constants::*;
pub use error::{
    ConfigError, ConfigResult, InferenceError, InferenceResult, LoadError, LoadResult,
};
pub use inference::{FeatureImportance, InferenceAdapter, PredictionResult, RiskLevel};
pub use loader::ArtifactLoader;
pub use observation::{
    Categorical, ChestPainType, ClinicalObservation, Feature, FeatureVector, RestingEcg, Sex,
    StSlope, Thalassemia, FEATURE_ORDER,
};
pub use schema::FormSchema;
