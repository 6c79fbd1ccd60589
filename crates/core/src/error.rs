use std::path::PathBuf;

/// Failure to obtain a usable classifier from the configured artifact source.
///
/// Every variant is fatal: the loader caches the failure and the application halts further
/// interaction instead of retrying. The payloads are plain strings so the cached outcome can be
/// handed out to every caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read model artifact {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },
    #[error("failed to fetch model artifact from {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("model artifact request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("malformed model artifact: {0}")]
    Malformed(String),
    #[error("unsupported model artifact format version {0}")]
    UnsupportedVersion(u32),
    #[error("model artifact feature order {found:?} does not match expected order {expected:?}")]
    FeatureOrderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("model artifact encoding mismatch: {0}")]
    EncodingMismatch(String),
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Failure while invoking a loaded classifier for a single observation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("classifier expects {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("classifier returned class {0}, expected 0 or 1")]
    InvalidClass(i64),
    #[error("classifier returned invalid probability {0}")]
    InvalidProbability(f64),
    #[error("classifier evaluation failed: {0}")]
    Evaluation(String),
}

pub type InferenceResult<T> = std::result::Result<T, InferenceError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
