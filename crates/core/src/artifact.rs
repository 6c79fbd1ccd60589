//! JSON model artifact format.
//!
//! An artifact is an envelope around one fitted model:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "feature_names": ["age", "sex", "cp", "trestbps", "chol", "fbs", "restecg",
//!                     "thalach", "exang", "oldpeak", "slope", "ca", "thal"],
//!   "encoding": { "major_vessels_max": 4, "categories": { "cp": ["typical_angina", "..."] } },
//!   "model": { "kind": "random_forest", "trees": [{ "nodes": [] }] }
//! }
//! ```
//!
//! Parsing checks the envelope against the canonical encoding before any classifier is built, so
//! a loaded handle is always structurally sound.

use crate::classifier::{ClassifierHandle, DecisionTree, LogisticRegression, RandomForest, TreeNode};
use crate::config::EncodingProfile;
use crate::constants::{ARTIFACT_FORMAT_VERSION, FEATURE_COUNT, FEATURE_NAMES};
use crate::error::{LoadError, LoadResult};
use crate::observation::Feature;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    feature_names: Vec<String>,
    #[serde(default)]
    encoding: Option<DeclaredEncoding>,
    model: ModelSpec,
}

/// Encoding the training pipeline declares for its categorical and bounded columns.
#[derive(Debug, Default, Deserialize)]
struct DeclaredEncoding {
    #[serde(default)]
    major_vessels_max: Option<u8>,
    #[serde(default)]
    categories: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelSpec {
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    RandomForest {
        trees: Vec<TreeSpec>,
        #[serde(default)]
        feature_importances: Option<Vec<f64>>,
    },
}

#[derive(Debug, Deserialize)]
struct TreeSpec {
    nodes: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeSpec {
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

/// A classifier built from an artifact, plus what the artifact said about its own encoding.
#[derive(Debug)]
pub struct ParsedArtifact {
    pub classifier: ClassifierHandle,
    /// Whether the artifact declared any encoding metadata. When it did not, the canonical
    /// encoding is assumed unchecked.
    pub declares_encoding: bool,
}

/// Deserialize and validate an artifact from raw bytes.
///
/// # Errors
///
/// Returns a [`LoadError`] if the bytes are not a valid artifact, the format version is not
/// supported, the feature order differs from the canonical order, the declared encoding
/// disagrees with `profile`, or the model structure is inconsistent.
pub fn parse_artifact(bytes: &[u8], profile: &EncodingProfile) -> LoadResult<ParsedArtifact> {
    let envelope: ArtifactEnvelope =
        serde_json::from_slice(bytes).map_err(|e| LoadError::Malformed(e.to_string()))?;

    if envelope.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion(envelope.format_version));
    }

    validate_feature_names(&envelope.feature_names)?;

    let declares_encoding = envelope.encoding.is_some();
    if let Some(encoding) = &envelope.encoding {
        validate_encoding(encoding, profile)?;
    }

    let classifier = build_classifier(envelope.model)?;
    Ok(ParsedArtifact {
        classifier,
        declares_encoding,
    })
}

fn validate_feature_names(found: &[String]) -> LoadResult<()> {
    if found.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
        return Err(LoadError::FeatureOrderMismatch {
            expected: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            found: found.to_vec(),
        });
    }
    Ok(())
}

fn validate_encoding(encoding: &DeclaredEncoding, profile: &EncodingProfile) -> LoadResult<()> {
    if let Some(max) = encoding.major_vessels_max {
        if max != profile.major_vessels_max() {
            return Err(LoadError::EncodingMismatch(format!(
                "artifact was trained with major vessels 0-{max}, configuration says 0-{}",
                profile.major_vessels_max()
            )));
        }
    }

    for (column, labels) in &encoding.categories {
        let expected = Feature::from_column(column)
            .and_then(Feature::category_slugs)
            .ok_or_else(|| {
                LoadError::EncodingMismatch(format!("'{column}' is not a categorical column"))
            })?;
        if labels.iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(LoadError::EncodingMismatch(format!(
                "'{column}' categories {labels:?} differ from {expected:?}"
            )));
        }
    }

    Ok(())
}

fn build_classifier(spec: ModelSpec) -> LoadResult<ClassifierHandle> {
    match spec {
        ModelSpec::LogisticRegression {
            coefficients,
            intercept,
        } => {
            if coefficients.len() != FEATURE_COUNT {
                return Err(LoadError::Malformed(format!(
                    "logistic regression has {} coefficients, expected {FEATURE_COUNT}",
                    coefficients.len()
                )));
            }
            if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                return Err(LoadError::Malformed(
                    "logistic regression parameters must be finite".into(),
                ));
            }
            Ok(Arc::new(LogisticRegression::new(coefficients, intercept)))
        }
        ModelSpec::RandomForest {
            trees,
            feature_importances,
        } => {
            if trees.is_empty() {
                return Err(LoadError::Malformed("random forest has no trees".into()));
            }
            let trees = trees
                .into_iter()
                .enumerate()
                .map(|(i, tree)| build_tree(i, tree))
                .collect::<LoadResult<Vec<_>>>()?;

            if let Some(weights) = &feature_importances {
                if weights.len() != FEATURE_COUNT {
                    return Err(LoadError::Malformed(format!(
                        "feature_importances has {} entries, expected {FEATURE_COUNT}",
                        weights.len()
                    )));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(LoadError::Malformed(
                        "feature_importances must be finite and non-negative".into(),
                    ));
                }
            }

            Ok(Arc::new(RandomForest::new(
                FEATURE_COUNT,
                trees,
                feature_importances,
            )))
        }
    }
}

fn build_tree(tree_index: usize, spec: TreeSpec) -> LoadResult<DecisionTree> {
    let malformed = |msg: String| LoadError::Malformed(format!("tree {tree_index}: {msg}"));

    if spec.nodes.is_empty() {
        return Err(malformed("no nodes".into()));
    }

    let len = spec.nodes.len();
    let mut nodes = Vec::with_capacity(len);
    for (i, node) in spec.nodes.into_iter().enumerate() {
        let node = match node {
            NodeSpec::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if feature >= FEATURE_COUNT {
                    return Err(malformed(format!("node {i} splits on unknown feature {feature}")));
                }
                if threshold.is_nan() {
                    return Err(malformed(format!("node {i} has a NaN threshold")));
                }
                for child in [left, right] {
                    if child <= i || child >= len {
                        return Err(malformed(format!(
                            "node {i} has child {child} outside {}..{len}",
                            i + 1
                        )));
                    }
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }
            }
            NodeSpec::Leaf { value } => {
                let [n0, n1] = <[f64; 2]>::try_from(value.as_slice()).map_err(|_| {
                    malformed(format!(
                        "leaf {i} has {} class values, expected 2",
                        value.len()
                    ))
                })?;
                let total = n0 + n1;
                if !(n0.is_finite() && n1.is_finite() && n0 >= 0.0 && n1 >= 0.0 && total > 0.0)
                {
                    return Err(malformed(format!(
                        "leaf {i} must hold non-negative class weights with a positive sum"
                    )));
                }
                TreeNode::Leaf {
                    distribution: [n0 / total, n1 / total],
                }
            }
        };
        nodes.push(node);
    }

    Ok(DecisionTree::new(nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> EncodingProfile {
        EncodingProfile::new(4).unwrap()
    }

    fn logistic_artifact() -> serde_json::Value {
        json!({
            "format_version": 1,
            "feature_names": FEATURE_NAMES,
            "model": {
                "kind": "logistic_regression",
                "coefficients": vec![0.0_f64; 13],
                "intercept": 0.25
            }
        })
    }

    fn forest_artifact(nodes: serde_json::Value) -> serde_json::Value {
        json!({
            "format_version": 1,
            "feature_names": FEATURE_NAMES,
            "encoding": { "major_vessels_max": 4 },
            "model": { "kind": "random_forest", "trees": [{ "nodes": nodes }] }
        })
    }

    fn parse(value: serde_json::Value) -> LoadResult<ParsedArtifact> {
        parse_artifact(&serde_json::to_vec(&value).unwrap(), &profile())
    }

    #[test]
    fn test_parse_logistic_regression() {
        let parsed = parse(logistic_artifact()).unwrap();

        assert_eq!(parsed.classifier.kind(), "logistic_regression");
        assert_eq!(parsed.classifier.n_features(), 13);
        assert!(!parsed.declares_encoding);
    }

    #[test]
    fn test_parse_forest_normalizes_leaf_counts() {
        let parsed = parse(forest_artifact(json!([
            { "feature": 2, "threshold": 0.5, "left": 1, "right": 2 },
            { "value": [9.0, 11.0] },
            { "value": [3.0, 1.0] }
        ])))
        .unwrap();

        assert!(parsed.declares_encoding);
        let mut x = [0.0; 13];
        let [_, p1] = parsed.classifier.predict_proba(&x).unwrap();
        assert!((p1 - 0.55).abs() < 1e-12);
        x[2] = 3.0;
        let [_, p1] = parsed.classifier.predict_proba(&x).unwrap();
        assert!((p1 - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_garbage_bytes_are_malformed() {
        let err = parse_artifact(b"\x80\x04\x95 not json", &profile()).unwrap_err();

        assert!(matches!(err, LoadError::Malformed(_)));
    }

    #[test]
    fn test_unsupported_version() {
        let mut artifact = logistic_artifact();
        artifact["format_version"] = json!(2);

        assert_eq!(parse(artifact).unwrap_err(), LoadError::UnsupportedVersion(2));
    }

    #[test]
    fn test_reordered_features_are_rejected() {
        let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
        names.swap(2, 3);
        let mut artifact = logistic_artifact();
        artifact["feature_names"] = json!(names);

        let err = parse(artifact).unwrap_err();

        assert!(matches!(err, LoadError::FeatureOrderMismatch { .. }));
    }

    #[test]
    fn test_declared_major_vessels_range_must_match_configuration() {
        let artifact = forest_artifact(json!([{ "value": [1.0, 1.0] }]));

        let err = parse_artifact(
            &serde_json::to_vec(&artifact).unwrap(),
            &EncodingProfile::new(3).unwrap(),
        )
        .unwrap_err();

        assert!(matches!(err, LoadError::EncodingMismatch(_)));
    }

    #[test]
    fn test_declared_categories_must_match_canonical_order() {
        let mut artifact = logistic_artifact();
        artifact["encoding"] = json!({
            "categories": { "cp": ["asymptomatic", "atypical_angina", "non_anginal_pain", "typical_angina"] }
        });

        let err = parse(artifact).unwrap_err();
        assert!(matches!(err, LoadError::EncodingMismatch(msg) if msg.contains("'cp'")));

        let mut artifact = logistic_artifact();
        artifact["encoding"] = json!({ "categories": { "age": ["young", "old"] } });
        assert!(matches!(parse(artifact).unwrap_err(), LoadError::EncodingMismatch(_)));

        let mut artifact = logistic_artifact();
        artifact["encoding"] = json!({
            "categories": { "thal": ["normal", "fixed_defect", "reversible_defect", "unknown"] }
        });
        assert!(parse(artifact).unwrap().declares_encoding);
    }

    #[test]
    fn test_wrong_coefficient_count_is_malformed() {
        let mut artifact = logistic_artifact();
        artifact["model"]["coefficients"] = json!([1.0, 2.0]);

        assert!(matches!(parse(artifact).unwrap_err(), LoadError::Malformed(_)));
    }

    #[test]
    fn test_tree_structure_is_validated() {
        let backwards = forest_artifact(json!([
            { "value": [1.0, 0.0] },
            { "feature": 0, "threshold": 1.0, "left": 0, "right": 0 }
        ]));
        let unknown_feature = forest_artifact(json!([
            { "feature": 13, "threshold": 1.0, "left": 1, "right": 2 },
            { "value": [1.0, 0.0] },
            { "value": [0.0, 1.0] }
        ]));
        let empty_leaf = forest_artifact(json!([{ "value": [0.0, 0.0] }]));
        let three_classes = forest_artifact(json!([{ "value": [1.0, 1.0, 1.0] }]));

        for artifact in [backwards, unknown_feature, empty_leaf, three_classes] {
            assert!(matches!(parse(artifact).unwrap_err(), LoadError::Malformed(_)));
        }
    }

    #[test]
    fn test_feature_importances_must_cover_every_feature() {
        let mut artifact = forest_artifact(json!([{ "value": [1.0, 1.0] }]));
        artifact["model"]["feature_importances"] = json!([0.5, 0.5]);

        assert!(matches!(parse(artifact).unwrap_err(), LoadError::Malformed(_)));
    }
}
