use crate::dto::HealthRes;
use cardio_core::{ClassifierHandle, LoadResult};

/// Health service shared by the HTTP surfaces.
///
/// The service is alive as long as the process answers; `ok` additionally reports whether the
/// model artifact is usable, so a failed load shows up in monitoring.
#[derive(Clone)]
pub struct HealthService;

impl HealthService {
    /// Creates a new instance of HealthService.
    pub fn new() -> Self {
        Self
    }

    /// Build a health response from the loader's cached outcome.
    ///
    /// # Arguments
    /// * `model` - `None` while the artifact has not been loaded yet, otherwise the cached load
    ///   outcome.
    pub fn check_health(model: Option<&LoadResult<ClassifierHandle>>) -> HealthRes {
        match model {
            Some(Ok(handle)) => HealthRes {
                ok: true,
                model_loaded: true,
                message: format!("cardio is alive ({} model loaded)", handle.kind()),
            },
            Some(Err(e)) => HealthRes {
                ok: false,
                model_loaded: false,
                message: format!("model unavailable: {e}"),
            },
            None => HealthRes {
                ok: true,
                model_loaded: false,
                message: "cardio is alive (model not loaded yet)".into(),
            },
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}
