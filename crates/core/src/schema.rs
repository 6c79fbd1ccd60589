//! Input form description.
//!
//! The form schema lists the 13 input widgets, their ranges and defaults, split over two panels.
//! It is consumed by the HTML renderer and served as JSON so other front ends can build the same
//! form. Ranges constrain the widgets only; the inference adapter never checks them.

use crate::config::EncodingProfile;
use crate::observation::{
    Categorical, ChestPainType, ClinicalObservation, Feature, RestingEcg, Sex, StSlope,
    Thalassemia, FEATURE_ORDER,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChoiceOption {
    /// Value submitted by the form.
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    Slider {
        min: f64,
        max: f64,
        step: f64,
        default: f64,
    },
    Number {
        min: f64,
        max: f64,
        step: f64,
        default: f64,
    },
    Choice {
        options: Vec<ChoiceOption>,
        default: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldSchema {
    pub feature: Feature,
    /// Form field name, matching the observation field.
    pub name: String,
    pub label: String,
    /// 1 for the left panel, 2 for the right panel.
    pub panel: u8,
    pub widget: Widget,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FormSchema {
    pub fields: Vec<FieldSchema>,
}

fn slider(min: f64, max: f64, default: f64) -> Widget {
    Widget::Slider {
        min,
        max,
        step: 1.0,
        default,
    }
}

fn number(min: f64, max: f64, step: f64, default: f64) -> Widget {
    Widget::Number {
        min,
        max,
        step,
        default,
    }
}

fn choice<C: Categorical>(default: C) -> Widget {
    Widget::Choice {
        options: C::ALL
            .iter()
            .map(|c| ChoiceOption {
                value: c.slug().to_string(),
                label: c.label().to_string(),
            })
            .collect(),
        default: default.slug().to_string(),
    }
}

fn yes_no() -> Widget {
    Widget::Choice {
        options: vec![
            ChoiceOption {
                value: "false".into(),
                label: "No".into(),
            },
            ChoiceOption {
                value: "true".into(),
                label: "Yes".into(),
            },
        ],
        default: "false".into(),
    }
}

fn widget_for(feature: Feature, encoding: EncodingProfile) -> Widget {
    match feature {
        Feature::Age => slider(20.0, 100.0, 50.0),
        Feature::Sex => choice(Sex::Female),
        Feature::ChestPainType => choice(ChestPainType::TypicalAngina),
        Feature::RestingBp => number(90.0, 200.0, 1.0, 120.0),
        Feature::Cholesterol => number(100.0, 600.0, 1.0, 200.0),
        Feature::FastingBloodSugarHigh => yes_no(),
        Feature::RestingEcg => choice(RestingEcg::Normal),
        Feature::MaxHeartRate => number(60.0, 220.0, 1.0, 150.0),
        Feature::ExerciseAngina => yes_no(),
        Feature::StDepression => number(0.0, 6.0, 0.1, 1.0),
        Feature::StSlope => choice(StSlope::Upsloping),
        Feature::MajorVessels => slider(0.0, f64::from(encoding.major_vessels_max()), 0.0),
        Feature::Thalassemia => choice(Thalassemia::Normal),
    }
}

fn panel_for(feature: Feature) -> u8 {
    // The first five attributes (demographics and resting measurements) sit in the left panel.
    if feature.index() < Feature::FastingBloodSugarHigh.index() {
        1
    } else {
        2
    }
}

impl FormSchema {
    pub fn new(encoding: EncodingProfile) -> Self {
        let fields = FEATURE_ORDER
            .iter()
            .map(|feature| FieldSchema {
                feature: *feature,
                name: feature.field().to_string(),
                label: feature.label().to_string(),
                panel: panel_for(*feature),
                widget: widget_for(*feature, encoding),
            })
            .collect();
        Self { fields }
    }

    pub fn panel(&self, panel: u8) -> impl Iterator<Item = &FieldSchema> + '_ {
        self.fields.iter().filter(move |f| f.panel == panel)
    }

    /// The observation the form shows before any input.
    pub fn default_observation() -> ClinicalObservation {
        ClinicalObservation {
            age: 50,
            sex: Sex::Female,
            chest_pain_type: ChestPainType::TypicalAngina,
            resting_bp: 120,
            cholesterol: 200,
            fasting_blood_sugar_high: false,
            resting_ecg: RestingEcg::Normal,
            max_heart_rate: 150,
            exercise_angina: false,
            st_depression: 1.0,
            st_slope: StSlope::Upsloping,
            major_vessels: 0,
            thalassemia: Thalassemia::Normal,
        }
    }
}

/// The value an observation holds for a field, in the form's submitted representation.
pub fn form_value(observation: &ClinicalObservation, feature: Feature) -> String {
    match feature {
        Feature::Sex => observation.sex.slug().to_string(),
        Feature::ChestPainType => observation.chest_pain_type.slug().to_string(),
        Feature::FastingBloodSugarHigh => observation.fasting_blood_sugar_high.to_string(),
        Feature::RestingEcg => observation.resting_ecg.slug().to_string(),
        Feature::ExerciseAngina => observation.exercise_angina.to_string(),
        Feature::StSlope => observation.st_slope.slug().to_string(),
        Feature::Thalassemia => observation.thalassemia.slug().to_string(),
        Feature::StDepression => format!("{:.1}", observation.st_depression),
        numeric => format!("{}", observation.encode(numeric)),
    }
}
