use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use cardio_core::config::{
    artifact_source_from_env_value, encoding_profile_from_env_value, top_features_from_env_value,
};
use cardio_core::{ArtifactLoader, CoreConfig};

/// Default log directives: the core crate and the REST layer both log at info.
const LOG_DIRECTIVES: [&str; 2] = ["cardio=info", "api_rest=info"];

fn log_filter(base: EnvFilter) -> anyhow::Result<EnvFilter> {
    LOG_DIRECTIVES
        .iter()
        .try_fold(base, |filter, directive| Ok(filter.add_directive(directive.parse()?)))
}

/// Main entry point for the cardio risk predictor
///
/// Resolves configuration, loads the model artifact once and serves the browser form and JSON
/// API on one REST listener.
///
/// A failed artifact load does not stop the server: the failure is cached and every page
/// reports it until the process is restarted with a valid model.
///
/// # Environment Variables
/// - `CARDIO_MODEL_SOURCE`: artifact path or http(s) URL (default: "models/final_heart_disease_model.json")
/// - `CARDIO_MAJOR_VESSELS_MAX`: upper bound of the major vessels count, 3 or 4 (required)
/// - `CARDIO_TOP_FEATURES`: number of ranked attributes shown with a prediction (default: 5)
/// - `CARDIO_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(log_filter(EnvFilter::from_default_env())?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let artifact_source =
        artifact_source_from_env_value(std::env::var("CARDIO_MODEL_SOURCE").ok())?;
    let encoding =
        encoding_profile_from_env_value(std::env::var("CARDIO_MAJOR_VESSELS_MAX").ok())?;
    let top_features = top_features_from_env_value(std::env::var("CARDIO_TOP_FEATURES").ok())?;
    let cfg = Arc::new(CoreConfig::new(artifact_source, encoding, top_features)?);

    let rest_addr = std::env::var("CARDIO_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let loader = Arc::new(ArtifactLoader::from_config(&cfg));
    match loader.load().await {
        Ok(handle) => tracing::info!("++ Model ready ({})", handle.kind()),
        Err(e) => tracing::error!("++ Model unavailable, serving error page: {e}"),
    }

    let app = router(AppState::new(cfg, loader));

    tracing::info!("++ Starting cardio REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_filter_keeps_rest_layer_warnings() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(log_filter(EnvFilter::new("off")).unwrap())
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "api_rest", "label disagrees with probability");
            tracing::info!(target: "cardio_core::loader", "model artifact loaded");
            tracing::info!(target: "hyper::proto", "connection accepted");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("label disagrees with probability"));
        assert!(output.contains("model artifact loaded"));
        assert!(!output.contains("connection accepted"));
    }
}
