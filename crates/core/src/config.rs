//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the loader and adapters.
//! Nothing in the core reads environment variables during request handling; the binaries read
//! them and hand the raw values to the `*_from_env_value` helpers below.

use crate::constants::{
    DEFAULT_MODEL_SOURCE, DEFAULT_TOP_FEATURES, FEATURE_COUNT, SUPPORTED_MAJOR_VESSELS_MAX,
};
use crate::error::{ConfigError, ConfigResult};
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where the model artifact comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactSource {
    Local(PathBuf),
    Remote(Url),
}

impl ArtifactSource {
    /// Interpret a source string: `http://` and `https://` URLs are remote, anything else is a
    /// filesystem path.
    pub fn parse(value: &str) -> ConfigResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidInput(
                "model source cannot be empty".into(),
            ));
        }

        let lower = value.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(value).map_err(|e| {
                ConfigError::InvalidInput(format!("invalid model URL '{value}': {e}"))
            })?;
            return Ok(Self::Remote(url));
        }

        Ok(Self::Local(PathBuf::from(value)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// The parts of the categorical/bounded encoding that differ between training pipelines.
///
/// The label lists are canonical (see [`crate::observation`]); only the `major_vessels` upper
/// bound is configurable, and it must be supplied explicitly because it cannot be inferred from
/// an artifact that does not declare it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodingProfile {
    major_vessels_max: u8,
}

impl EncodingProfile {
    pub fn new(major_vessels_max: u8) -> ConfigResult<Self> {
        if !SUPPORTED_MAJOR_VESSELS_MAX.contains(&major_vessels_max) {
            return Err(ConfigError::InvalidInput(format!(
                "major vessels maximum must be one of {SUPPORTED_MAJOR_VESSELS_MAX:?}, got {major_vessels_max}"
            )));
        }
        Ok(Self { major_vessels_max })
    }

    pub fn major_vessels_max(&self) -> u8 {
        self.major_vessels_max
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    artifact_source: ArtifactSource,
    encoding: EncodingProfile,
    top_features: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        artifact_source: ArtifactSource,
        encoding: EncodingProfile,
        top_features: usize,
    ) -> ConfigResult<Self> {
        if top_features == 0 || top_features > FEATURE_COUNT {
            return Err(ConfigError::InvalidInput(format!(
                "top features must be between 1 and {FEATURE_COUNT}, got {top_features}"
            )));
        }

        Ok(Self {
            artifact_source,
            encoding,
            top_features,
        })
    }

    pub fn artifact_source(&self) -> &ArtifactSource {
        &self.artifact_source
    }

    pub fn encoding(&self) -> EncodingProfile {
        self.encoding
    }

    pub fn top_features(&self) -> usize {
        self.top_features
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the artifact source from an optional string value.
///
/// If `value` is `None` or empty, the default artifact path is used. A relative default is
/// resolved against the working directory first and then against the ancestors of
/// `CARGO_MANIFEST_DIR`, so the checked-in model is found from any workspace member.
pub fn artifact_source_from_env_value(value: Option<String>) -> ConfigResult<ArtifactSource> {
    match non_empty(value) {
        Some(v) => ArtifactSource::parse(&v),
        None => Ok(ArtifactSource::Local(resolve_default_model_path())),
    }
}

fn resolve_default_model_path() -> PathBuf {
    let cwd_relative = PathBuf::from(DEFAULT_MODEL_SOURCE);
    if cwd_relative.is_file() {
        return cwd_relative;
    }

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .map(|ancestor| ancestor.join(DEFAULT_MODEL_SOURCE))
        .find(|candidate| candidate.is_file())
        .unwrap_or(cwd_relative)
}

/// Parse the required `major_vessels` upper bound.
pub fn encoding_profile_from_env_value(value: Option<String>) -> ConfigResult<EncodingProfile> {
    let value = non_empty(value).ok_or(ConfigError::Missing("CARDIO_MAJOR_VESSELS_MAX"))?;
    let max = value.parse::<u8>().map_err(|_| {
        ConfigError::InvalidInput(format!("major vessels maximum '{value}' is not a number"))
    })?;
    EncodingProfile::new(max)
}

/// Parse the number of ranked features to display. Defaults to
/// [`DEFAULT_TOP_FEATURES`] when unset.
pub fn top_features_from_env_value(value: Option<String>) -> ConfigResult<usize> {
    match non_empty(value) {
        Some(v) => v.parse::<usize>().map_err(|_| {
            ConfigError::InvalidInput(format!("top features '{v}' is not a number"))
        }),
        None => Ok(DEFAULT_TOP_FEATURES),
    }
}
