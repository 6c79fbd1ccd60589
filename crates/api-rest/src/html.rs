//! Server-side HTML for the browser form.
//!
//! Pages are plain strings assembled from the [`FormSchema`]. Every piece of text that did not
//! originate in this module is escaped.

use cardio_core::schema::{form_value, FieldSchema, Widget};
use cardio_core::{
    ClinicalObservation, FeatureImportance, FormSchema, PredictionResult, RiskLevel,
    EDUCATIONAL_DISCLAIMER, FEATURE_ORDER,
};
use std::collections::BTreeMap;
use std::fmt::Write;

const TITLE: &str = "Heart Disease Risk Predictor";

const STYLE: &str = "body{font-family:sans-serif;max-width:52rem;margin:2rem auto;padding:0 1rem}\
.panels{display:flex;gap:2rem}.panel{flex:1}label{display:block;margin-top:.8rem;font-weight:600}\
input,select{width:100%}.alert{padding:.8rem;border-radius:.3rem;margin:1rem 0}\
.high{background:#fde2e1}.low{background:#dff5e3}.warning{background:#fff4d6}.info{background:#e3efff}\
.error{background:#fde2e1}.bar{background:#c0392b;height:.8rem}.feature{margin:.4rem 0}\
button{margin-top:1.5rem;padding:.6rem 1.2rem}footer{margin-top:2rem;color:#666;font-size:.85rem}";

/// What the results panel shows under the form.
#[derive(Debug)]
pub enum Outcome<'a> {
    Prediction {
        result: &'a PredictionResult,
        top_features: Option<&'a [FeatureImportance]>,
    },
    /// A per-request failure; the form stays usable.
    Error(&'a str),
}

/// Field values shown in the form, keyed by field name.
#[derive(Debug, Clone, PartialEq)]
pub struct FormValues(BTreeMap<String, String>);

impl FormValues {
    pub fn from_observation(observation: &ClinicalObservation) -> Self {
        Self(
            FEATURE_ORDER
                .iter()
                .map(|feature| (feature.field().to_string(), form_value(observation, *feature)))
                .collect(),
        )
    }

    /// Values exactly as submitted, even if they do not parse. Fields missing from the
    /// submission show their defaults; unknown names are ignored.
    pub fn from_submitted(pairs: Vec<(String, String)>) -> Self {
        let mut values = Self::from_observation(&FormSchema::default_observation());
        for (name, value) in pairs {
            if let Some(slot) = values.0.get_mut(&name) {
                *slot = value;
            }
        }
        values
    }

    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or_default()
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{TITLE}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>Heart Disease Risk Prediction</h1>\n\
         <p>Using a machine learning model trained on the UCI Heart Disease dataset</p>\n\
         {body}\n<footer><hr>{EDUCATIONAL_DISCLAIMER}</footer>\n</body>\n</html>\n"
    )
}

fn render_field(out: &mut String, field: &FieldSchema, values: &FormValues) {
    let name = escape(&field.name);
    let current = values.get(&field.name);
    let _ = write!(
        out,
        "<label for=\"{name}\">{}</label>",
        escape(&field.label)
    );

    match &field.widget {
        Widget::Slider { min, max, step, .. } => {
            let _ = write!(
                out,
                "<input type=\"range\" id=\"{name}\" name=\"{name}\" min=\"{min}\" max=\"{max}\" \
                 step=\"{step}\" value=\"{}\" oninput=\"this.nextElementSibling.value=this.value\">\
                 <output>{}</output>",
                escape(current),
                escape(current)
            );
        }
        Widget::Number { min, max, step, .. } => {
            let _ = write!(
                out,
                "<input type=\"number\" id=\"{name}\" name=\"{name}\" min=\"{min}\" max=\"{max}\" \
                 step=\"{step}\" value=\"{}\">",
                escape(current)
            );
        }
        Widget::Choice { options, .. } => {
            let _ = write!(out, "<select id=\"{name}\" name=\"{name}\">");
            for option in options {
                let selected = if option.value == current {
                    " selected"
                } else {
                    ""
                };
                let _ = write!(
                    out,
                    "<option value=\"{}\"{selected}>{}</option>",
                    escape(&option.value),
                    escape(&option.label)
                );
            }
            out.push_str("</select>");
        }
    }
}

fn render_form(schema: &FormSchema, values: &FormValues) -> String {
    let mut out = String::from(
        "<h2>Enter Patient Information</h2>\n<form method=\"post\" action=\"/predict\">\n\
         <div class=\"panels\">",
    );
    for panel in [1, 2] {
        out.push_str("<div class=\"panel\">");
        for field in schema.panel(panel) {
            render_field(&mut out, field, values);
        }
        out.push_str("</div>");
    }
    out.push_str(
        "</div>\n<button type=\"submit\">Predict Risk of Heart Disease</button>\n</form>\n",
    );
    out
}

fn render_top_features(out: &mut String, top_features: &[FeatureImportance]) {
    let max = top_features
        .iter()
        .map(|f| f.weight)
        .fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return;
    }

    out.push_str("<h3>Top contributing attributes</h3>");
    for feature in top_features {
        let width = feature.weight / max * 100.0;
        let _ = write!(
            out,
            "<div class=\"feature\">{} ({:.3})<div class=\"bar\" style=\"width:{width:.1}%\"></div></div>",
            escape(&feature.label),
            feature.weight
        );
    }
}

fn render_outcome(outcome: &Outcome<'_>) -> String {
    let mut out = String::from("<section id=\"result\">");
    match outcome {
        Outcome::Prediction {
            result,
            top_features,
        } => {
            let (class, note) = match result.risk_label {
                RiskLevel::High => ("high", "warning"),
                RiskLevel::Low => ("low", "info"),
            };
            let _ = write!(
                out,
                "<div class=\"alert {class}\">{}</div><div class=\"alert {note}\">{}</div>",
                escape(&result.to_string()),
                escape(&result.advisory)
            );
            if let Some(top) = top_features {
                render_top_features(&mut out, top);
            }
        }
        Outcome::Error(message) => {
            let _ = write!(
                out,
                "<div class=\"alert error\">Prediction failed: {}</div>",
                escape(message)
            );
        }
    }
    out.push_str("</section>");
    out
}

/// The form, pre-filled with `values`, followed by an optional results panel.
pub fn form_page(
    schema: &FormSchema,
    values: &FormValues,
    outcome: Option<&Outcome<'_>>,
) -> String {
    let mut body = render_form(schema, values);
    if let Some(outcome) = outcome {
        body.push_str(&render_outcome(outcome));
    }
    page(&body)
}

/// Shown instead of the form once the model could not be loaded.
pub fn fatal_page(message: &str) -> String {
    page(&format!(
        "<div class=\"alert error\">Error loading model: {}</div>\n\
         <p>The predictor is unavailable until the service is restarted with a valid model.</p>",
        escape(message)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardio_core::{EncodingProfile, Feature};

    fn schema() -> FormSchema {
        FormSchema::new(EncodingProfile::new(4).unwrap())
    }

    fn defaults() -> FormValues {
        FormValues::from_observation(&FormSchema::default_observation())
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<b>\"x\" & 'y'</b>"),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_form_page_renders_every_field_with_current_value() {
        let mut values = FormSchema::default_observation();
        values.thalassemia = cardio_core::Thalassemia::ReversibleDefect;

        let html = form_page(&schema(), &FormValues::from_observation(&values), None);

        for field in &schema().fields {
            assert!(html.contains(&format!("name=\"{}\"", field.name)), "{}", field.name);
        }
        assert!(html.contains("<option value=\"reversible_defect\" selected>"));
        assert!(html.contains("name=\"major_vessels\" min=\"0\" max=\"4\""));
        assert!(!html.contains("id=\"result\""));
    }

    #[test]
    fn test_submitted_values_are_shown_verbatim() {
        let values = FormValues::from_submitted(vec![
            ("age".into(), "63".into()),
            ("cholesterol".into(), "lots".into()),
            ("sex".into(), "male".into()),
            ("bmi".into(), "31".into()),
        ]);

        assert_eq!(values.get("cholesterol"), "lots");
        assert_eq!(values.get("resting_bp"), "120");
        assert_eq!(values.get("bmi"), "");

        let html = form_page(&schema(), &values, None);
        assert!(html.contains("name=\"age\" min=\"20\" max=\"100\" step=\"1\" value=\"63\""));
        assert!(html.contains("value=\"lots\""));
        assert!(html.contains("<option value=\"male\" selected>"));
    }

    #[test]
    fn test_outcome_panel_shows_label_and_ranked_features() {
        let result = PredictionResult {
            predicted_class: 1,
            risk_label: RiskLevel::High,
            probability: 0.75,
            advisory: RiskLevel::High.advisory().to_string(),
        };
        let top = vec![
            FeatureImportance {
                feature: Feature::ChestPainType,
                column: "cp".into(),
                label: Feature::ChestPainType.label().into(),
                weight: 0.4,
            },
            FeatureImportance {
                feature: Feature::Age,
                column: "age".into(),
                label: Feature::Age.label().into(),
                weight: 0.2,
            },
        ];
        let outcome = Outcome::Prediction {
            result: &result,
            top_features: Some(&top),
        };

        let html = form_page(&schema(), &defaults(), Some(&outcome));

        assert!(html.contains("High Risk – Probability: 75.0%"));
        assert!(html.contains("Recommend clinical review."));
        assert!(html.contains("width:100.0%"));
        assert!(html.contains("width:50.0%"));
    }

    #[test]
    fn test_error_outcome_and_fatal_page_escape_messages() {
        let outcome = Outcome::Error("bad <input>");
        let html = form_page(&schema(), &defaults(), Some(&outcome));
        assert!(html.contains("Prediction failed: bad &lt;input&gt;"));
        assert!(html.contains("<form"));

        let fatal = fatal_page("model artifact not found: <path>");
        assert!(fatal.contains("Error loading model: model artifact not found: &lt;path&gt;"));
        assert!(!fatal.contains("<form"));
    }
}
