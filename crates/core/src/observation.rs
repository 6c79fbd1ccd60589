//! Clinical observation record and its feature-vector encoding.
//!
//! The classifier consumes a 13-element numeric vector whose column order was fixed when the
//! model was trained. This module owns the single canonical encoding table:
//!
//! | # | Column | Attribute | Encoding |
//! |---|---|---|---|
//! | 0 | `age` | age | raw |
//! | 1 | `sex` | sex | female 0, male 1 |
//! | 2 | `cp` | chest pain type | ordinal 0–3 |
//! | 3 | `trestbps` | resting blood pressure | raw |
//! | 4 | `chol` | serum cholesterol | raw |
//! | 5 | `fbs` | fasting blood sugar > 120 mg/dl | 0/1 |
//! | 6 | `restecg` | resting ECG | ordinal 0–2 |
//! | 7 | `thalach` | maximum heart rate | raw |
//! | 8 | `exang` | exercise induced angina | 0/1 |
//! | 9 | `oldpeak` | ST depression | raw |
//! | 10 | `slope` | ST slope | ordinal 0–2 |
//! | 11 | `ca` | major vessels | raw |
//! | 12 | `thal` | thalassemia | ordinal 0–3 |
//!
//! Ordinal codes are the position of a label in its reference list. If the training pipeline
//! used a different ordering the classifier will silently produce wrong predictions; artifacts
//! may declare their encoding so the loader can reject such a mismatch.

use crate::constants::{FEATURE_COUNT, FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// A categorical attribute with a fixed reference list of labels.
pub trait Categorical: Copy + Sized + 'static {
    /// Every variant in reference-list order.
    const ALL: &'static [Self];

    /// Machine-readable label used on the wire and in artifact metadata.
    fn slug(self) -> &'static str;

    /// Human-readable label.
    fn label(self) -> &'static str;

    /// Ordinal code: the variant's position in [`Categorical::ALL`].
    fn code(self) -> u8;

    fn slugs() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.slug()).collect()
    }

    fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.slug() == slug || v.slug().replace('_', "-") == slug)
    }
}

/// A slug that does not name any variant of a categorical attribute.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {attribute} value '{value}' (expected one of: {expected})")]
pub struct UnknownCategory {
    pub attribute: &'static str,
    pub value: String,
    pub expected: String,
}

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident, $attribute:literal {
            $($variant:ident => ($slug:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl Categorical for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn slug(self) -> &'static str {
                match self {
                    $(Self::$variant => $slug),+
                }
            }

            fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            fn code(self) -> u8 {
                Self::ALL
                    .iter()
                    .position(|v| *v == self)
                    .unwrap_or_default() as u8
            }
        }

        impl FromStr for $name {
            type Err = UnknownCategory;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_slug(s).ok_or_else(|| UnknownCategory {
                    attribute: $attribute,
                    value: s.to_string(),
                    expected: Self::slugs().join(", "),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

categorical! {
    /// Patient sex as recorded in the training data.
    Sex, "sex" {
        Female => ("female", "Female"),
        Male => ("male", "Male"),
    }
}

categorical! {
    ChestPainType, "chest_pain_type" {
        TypicalAngina => ("typical_angina", "Typical angina"),
        AtypicalAngina => ("atypical_angina", "Atypical angina"),
        NonAnginalPain => ("non_anginal_pain", "Non-anginal pain"),
        Asymptomatic => ("asymptomatic", "Asymptomatic"),
    }
}

categorical! {
    /// Resting electrocardiographic result.
    RestingEcg, "resting_ecg" {
        Normal => ("normal", "Normal"),
        StTAbnormality => ("st_t_abnormality", "ST-T wave abnormality"),
        LvHypertrophy => ("lv_hypertrophy", "Left ventricular hypertrophy"),
    }
}

categorical! {
    /// Slope of the peak exercise ST segment.
    StSlope, "st_slope" {
        Upsloping => ("upsloping", "Upsloping"),
        Flat => ("flat", "Flat"),
        Downsloping => ("downsloping", "Downsloping"),
    }
}

categorical! {
    Thalassemia, "thalassemia" {
        Normal => ("normal", "Normal"),
        FixedDefect => ("fixed_defect", "Fixed defect"),
        ReversibleDefect => ("reversible_defect", "Reversible defect"),
        Unknown => ("unknown", "Unknown"),
    }
}

/// One column of the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Age,
    Sex,
    ChestPainType,
    RestingBp,
    Cholesterol,
    FastingBloodSugarHigh,
    RestingEcg,
    MaxHeartRate,
    ExerciseAngina,
    StDepression,
    StSlope,
    MajorVessels,
    Thalassemia,
}

/// Features in training-time column order.
pub const FEATURE_ORDER: [Feature; FEATURE_COUNT] = [
    Feature::Age,
    Feature::Sex,
    Feature::ChestPainType,
    Feature::RestingBp,
    Feature::Cholesterol,
    Feature::FastingBloodSugarHigh,
    Feature::RestingEcg,
    Feature::MaxHeartRate,
    Feature::ExerciseAngina,
    Feature::StDepression,
    Feature::StSlope,
    Feature::MajorVessels,
    Feature::Thalassemia,
];

impl Feature {
    /// Position of this feature in the vector.
    pub fn index(self) -> usize {
        FEATURE_ORDER
            .iter()
            .position(|f| *f == self)
            .unwrap_or_default()
    }

    pub fn from_index(index: usize) -> Option<Self> {
        FEATURE_ORDER.get(index).copied()
    }

    /// Artifact column name (`cp`, `thalach`, ...).
    pub fn column(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }

    /// Observation field name (`chest_pain_type`, `max_heart_rate`, ...).
    pub fn field(self) -> &'static str {
        match self {
            Feature::Age => "age",
            Feature::Sex => "sex",
            Feature::ChestPainType => "chest_pain_type",
            Feature::RestingBp => "resting_bp",
            Feature::Cholesterol => "cholesterol",
            Feature::FastingBloodSugarHigh => "fasting_blood_sugar_high",
            Feature::RestingEcg => "resting_ecg",
            Feature::MaxHeartRate => "max_heart_rate",
            Feature::ExerciseAngina => "exercise_angina",
            Feature::StDepression => "st_depression",
            Feature::StSlope => "st_slope",
            Feature::MajorVessels => "major_vessels",
            Feature::Thalassemia => "thalassemia",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Feature::Age => "Age",
            Feature::Sex => "Sex",
            Feature::ChestPainType => "Chest Pain Type (cp)",
            Feature::RestingBp => "Resting Blood Pressure (mm Hg)",
            Feature::Cholesterol => "Serum Cholesterol (mg/dl)",
            Feature::FastingBloodSugarHigh => "Fasting Blood Sugar > 120 mg/dl",
            Feature::RestingEcg => "Resting ECG Results",
            Feature::MaxHeartRate => "Maximum Heart Rate Achieved",
            Feature::ExerciseAngina => "Exercise Induced Angina",
            Feature::StDepression => "ST Depression (oldpeak)",
            Feature::StSlope => "Slope of Peak Exercise ST Segment",
            Feature::MajorVessels => "Number of Major Vessels Colored by Fluoroscopy",
            Feature::Thalassemia => "Thalassemia",
        }
    }

    /// Reference label list for categorical features, `None` for raw and boolean ones.
    pub fn category_slugs(self) -> Option<Vec<&'static str>> {
        match self {
            Feature::Sex => Some(Sex::slugs()),
            Feature::ChestPainType => Some(ChestPainType::slugs()),
            Feature::RestingEcg => Some(RestingEcg::slugs()),
            Feature::StSlope => Some(StSlope::slugs()),
            Feature::Thalassemia => Some(Thalassemia::slugs()),
            _ => None,
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        FEATURE_NAMES
            .iter()
            .position(|name| *name == column)
            .and_then(Self::from_index)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The 13 clinical attributes of one patient, as captured by the input form.
///
/// Numeric values are not range-checked here; the form widgets constrain them and anything else
/// passes through to the classifier unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClinicalObservation {
    /// Patient age in years.
    pub age: u32,
    pub sex: Sex,
    pub chest_pain_type: ChestPainType,
    /// Resting blood pressure in mmHg.
    pub resting_bp: u32,
    /// Serum cholesterol in mg/dl.
    pub cholesterol: u32,
    /// Fasting blood sugar above 120 mg/dl.
    pub fasting_blood_sugar_high: bool,
    pub resting_ecg: RestingEcg,
    pub max_heart_rate: u32,
    pub exercise_angina: bool,
    /// ST depression induced by exercise relative to rest.
    pub st_depression: f64,
    pub st_slope: StSlope,
    /// Number of major vessels colored by fluoroscopy.
    pub major_vessels: u32,
    pub thalassemia: Thalassemia,
}

impl ClinicalObservation {
    /// Encoded value of a single feature.
    pub fn encode(&self, feature: Feature) -> f64 {
        fn flag(value: bool) -> f64 {
            if value {
                1.0
            } else {
                0.0
            }
        }

        match feature {
            Feature::Age => f64::from(self.age),
            Feature::Sex => f64::from(self.sex.code()),
            Feature::ChestPainType => f64::from(self.chest_pain_type.code()),
            Feature::RestingBp => f64::from(self.resting_bp),
            Feature::Cholesterol => f64::from(self.cholesterol),
            Feature::FastingBloodSugarHigh => flag(self.fasting_blood_sugar_high),
            Feature::RestingEcg => f64::from(self.resting_ecg.code()),
            Feature::MaxHeartRate => f64::from(self.max_heart_rate),
            Feature::ExerciseAngina => flag(self.exercise_angina),
            Feature::StDepression => self.st_depression,
            Feature::StSlope => f64::from(self.st_slope.code()),
            Feature::MajorVessels => f64::from(self.major_vessels),
            Feature::Thalassemia => f64::from(self.thalassemia.code()),
        }
    }

    /// Assemble the feature vector in training-time column order.
    pub fn to_feature_vector(&self) -> FeatureVector {
        FeatureVector(FEATURE_ORDER.map(|feature| self.encode(feature)))
    }
}

/// Encoded observation, one value per column in [`FEATURE_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    /// (column name, value) pairs in vector order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
pub(crate) fn sample_observation() -> ClinicalObservation {
    ClinicalObservation {
        age: 63,
        sex: Sex::Male,
        chest_pain_type: ChestPainType::TypicalAngina,
        resting_bp: 145,
        cholesterol: 233,
        fasting_blood_sugar_high: true,
        resting_ecg: RestingEcg::Normal,
        max_heart_rate: 150,
        exercise_angina: false,
        st_depression: 2.3,
        st_slope: StSlope::Downsloping,
        major_vessels: 0,
        thalassemia: Thalassemia::FixedDefect,
    }
}
