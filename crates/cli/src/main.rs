use api_shared::PredictRes;
use cardio_core::config::{
    artifact_source_from_env_value, encoding_profile_from_env_value, top_features_from_env_value,
};
use cardio_core::{
    ArtifactLoader, ChestPainType, ClinicalObservation, CoreConfig, Feature, InferenceAdapter,
    RestingEcg, Sex, StSlope, Thalassemia, EDUCATIONAL_DISCLAIMER, FEATURE_ORDER,
};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cardio")]
#[command(about = "Heart disease risk predictor CLI")]
struct Cli {
    /// Model artifact path or URL (falls back to CARDIO_MODEL_SOURCE)
    #[arg(long, global = true)]
    model: Option<String>,
    /// Upper bound of the major vessels count, 3 or 4 (falls back to CARDIO_MAJOR_VESSELS_MAX)
    #[arg(long, global = true)]
    major_vessels_max: Option<u8>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict heart disease risk for one patient
    Predict {
        #[command(flatten)]
        observation: ObservationArgs,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the attributes the model weighs most
    Importances {
        /// Number of attributes to list (falls back to CARDIO_TOP_FEATURES)
        #[arg(long)]
        top: Option<usize>,
    },
    /// Print how each attribute is encoded into the feature vector
    Encoding,
}

#[derive(Args)]
struct ObservationArgs {
    /// Age in years
    #[arg(long)]
    age: u32,
    /// female | male
    #[arg(long)]
    sex: Sex,
    /// typical_angina | atypical_angina | non_anginal_pain | asymptomatic
    #[arg(long)]
    chest_pain_type: ChestPainType,
    /// Resting blood pressure (mm Hg)
    #[arg(long)]
    resting_bp: u32,
    /// Serum cholesterol (mg/dl)
    #[arg(long)]
    cholesterol: u32,
    /// Fasting blood sugar above 120 mg/dl
    #[arg(long)]
    fasting_blood_sugar_high: bool,
    /// normal | st_t_abnormality | lv_hypertrophy
    #[arg(long)]
    resting_ecg: RestingEcg,
    /// Maximum heart rate achieved
    #[arg(long)]
    max_heart_rate: u32,
    /// Exercise induced angina
    #[arg(long)]
    exercise_angina: bool,
    /// ST depression induced by exercise relative to rest
    #[arg(long)]
    st_depression: f64,
    /// upsloping | flat | downsloping
    #[arg(long)]
    st_slope: StSlope,
    /// Number of major vessels colored by fluoroscopy
    #[arg(long)]
    major_vessels: u32,
    /// normal | fixed_defect | reversible_defect | unknown
    #[arg(long)]
    thalassemia: Thalassemia,
}

impl From<ObservationArgs> for ClinicalObservation {
    fn from(args: ObservationArgs) -> Self {
        ClinicalObservation {
            age: args.age,
            sex: args.sex,
            chest_pain_type: args.chest_pain_type,
            resting_bp: args.resting_bp,
            cholesterol: args.cholesterol,
            fasting_blood_sugar_high: args.fasting_blood_sugar_high,
            resting_ecg: args.resting_ecg,
            max_heart_rate: args.max_heart_rate,
            exercise_angina: args.exercise_angina,
            st_depression: args.st_depression,
            st_slope: args.st_slope,
            major_vessels: args.major_vessels,
            thalassemia: args.thalassemia,
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Flags win over environment variables, which win over defaults.
fn resolve_config(
    cli: &Cli,
    top: Option<usize>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<CoreConfig, Box<dyn std::error::Error>> {
    let source =
        artifact_source_from_env_value(cli.model.clone().or_else(|| env("CARDIO_MODEL_SOURCE")))?;
    let encoding = encoding_profile_from_env_value(
        cli.major_vessels_max
            .map(|max| max.to_string())
            .or_else(|| env("CARDIO_MAJOR_VESSELS_MAX")),
    )?;
    let top_features = match top {
        Some(n) => n,
        None => top_features_from_env_value(env("CARDIO_TOP_FEATURES"))?,
    };
    Ok(CoreConfig::new(source, encoding, top_features)?)
}

async fn load_adapter(cfg: &CoreConfig) -> Result<InferenceAdapter, Box<dyn std::error::Error>> {
    let loader = ArtifactLoader::from_config(cfg);
    let handle = loader.load().await?;
    Ok(InferenceAdapter::new(handle))
}

fn print_encoding(major_vessels_max: u8) {
    for feature in FEATURE_ORDER {
        let encoding = match feature.category_slugs() {
            Some(slugs) => slugs
                .iter()
                .enumerate()
                .map(|(code, slug)| format!("{slug}={code}"))
                .collect::<Vec<_>>()
                .join(", "),
            None => match feature {
                Feature::FastingBloodSugarHigh | Feature::ExerciseAngina => {
                    "false=0, true=1".to_string()
                }
                Feature::MajorVessels => format!("count 0..={major_vessels_max}"),
                _ => "raw value".to_string(),
            },
        };
        println!(
            "{:>2}  {:<9} {:<48} {}",
            feature.index(),
            feature.column(),
            feature.label(),
            encoding
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("cardio=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Predict { .. }) | Some(Commands::Importances { .. }) => {}
        Some(Commands::Encoding) => {
            let cfg = resolve_config(&cli, None, env_value)?;
            print_encoding(cfg.encoding().major_vessels_max());
            return Ok(());
        }
        None => {
            println!("Use 'cardio --help' for commands");
            return Ok(());
        }
    }

    let top = match &cli.command {
        Some(Commands::Importances { top }) => *top,
        _ => None,
    };
    let cfg = resolve_config(&cli, top, env_value)?;
    let adapter = load_adapter(&cfg).await?;

    match cli.command {
        Some(Commands::Predict { observation, json }) => {
            let observation = ClinicalObservation::from(observation);
            let result = adapter.predict(&observation)?;
            let top_features = adapter.top_features(cfg.top_features());

            if json {
                let res = PredictRes::new(&result, top_features);
                println!("{}", serde_json::to_string_pretty(&res)?);
            } else {
                println!("{result}");
                println!("{}", result.advisory);
                if let Some(top_features) = top_features {
                    println!();
                    println!("Top contributing attributes:");
                    for feature in top_features {
                        println!("  {:<9} {:.3}  {}", feature.column, feature.weight, feature.label);
                    }
                }
                println!();
                println!("{EDUCATIONAL_DISCLAIMER}");
            }
        }
        Some(Commands::Importances { .. }) => match adapter.top_features(cfg.top_features()) {
            Some(top_features) => {
                for (rank, feature) in top_features.iter().enumerate() {
                    println!(
                        "{:>2}. {:<9} {:.3}  {}",
                        rank + 1,
                        feature.column,
                        feature.weight,
                        feature.label
                    );
                }
            }
            None => println!(
                "The {} model does not expose feature importances.",
                adapter.classifier().kind()
            ),
        },
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardio_core::ArtifactSource;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_flags_take_precedence_over_environment() {
        let cli = Cli::try_parse_from([
            "cardio",
            "--model",
            "flag.json",
            "--major-vessels-max",
            "3",
            "importances",
        ])
        .unwrap();
        let env = env_from(&[
            ("CARDIO_MODEL_SOURCE", "env.json"),
            ("CARDIO_MAJOR_VESSELS_MAX", "4"),
            ("CARDIO_TOP_FEATURES", "7"),
        ]);

        let cfg = resolve_config(&cli, Some(2), env).unwrap();

        assert_eq!(
            cfg.artifact_source(),
            &ArtifactSource::Local(PathBuf::from("flag.json"))
        );
        assert_eq!(cfg.encoding().major_vessels_max(), 3);
        assert_eq!(cfg.top_features(), 2);
    }

    #[test]
    fn test_environment_fills_missing_flags() {
        let cli = Cli::try_parse_from(["cardio", "encoding"]).unwrap();
        let env = env_from(&[
            ("CARDIO_MODEL_SOURCE", "https://models.example.org/heart.json"),
            ("CARDIO_MAJOR_VESSELS_MAX", "4"),
            ("CARDIO_TOP_FEATURES", "7"),
        ]);

        let cfg = resolve_config(&cli, None, env).unwrap();

        assert!(cfg.artifact_source().is_remote());
        assert_eq!(cfg.encoding().major_vessels_max(), 4);
        assert_eq!(cfg.top_features(), 7);
    }

    #[test]
    fn test_major_vessels_max_is_required() {
        let cli = Cli::try_parse_from(["cardio", "encoding"]).unwrap();

        assert!(resolve_config(&cli, None, env_from(&[])).is_err());
    }

    #[test]
    fn test_predict_flags_map_onto_observation() {
        let cli = Cli::try_parse_from([
            "cardio",
            "predict",
            "--age",
            "63",
            "--sex",
            "male",
            "--chest-pain-type",
            "typical_angina",
            "--resting-bp",
            "145",
            "--cholesterol",
            "233",
            "--fasting-blood-sugar-high",
            "--resting-ecg",
            "normal",
            "--max-heart-rate",
            "150",
            "--st-depression",
            "2.3",
            "--st-slope",
            "downsloping",
            "--major-vessels",
            "0",
            "--thalassemia",
            "fixed-defect",
            "--json",
        ])
        .unwrap();

        let Some(Commands::Predict { observation, json }) = cli.command else {
            panic!("expected predict command");
        };
        let observation = ClinicalObservation::from(observation);

        assert!(json);
        assert_eq!(
            observation,
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
        );
    }

    #[test]
    fn test_unknown_category_is_rejected_by_parser() {
        let parsed = Cli::try_parse_from([
            "cardio", "predict", "--age", "63", "--sex", "robot",
        ]);

        assert!(parsed.is_err());
    }
}
