//! Artifact loading with process-lifetime memoization.
//!
//! [`ArtifactLoader`] resolves the configured [`ArtifactSource`] exactly once. The outcome,
//! success or failure, is cached: later calls return the same [`ClassifierHandle`] (the same
//! `Arc`) or the same [`LoadError`] without touching the disk or the network again. A failed
//! load is therefore terminal for the process.
//!
//! Remote artifacts are fetched with a single HTTP GET. There is no timeout, retry or fallback.

use crate::artifact::{parse_artifact, ParsedArtifact};
use crate::classifier::ClassifierHandle;
use crate::config::{ArtifactSource, CoreConfig, EncodingProfile};
use crate::error::{LoadError, LoadResult};
use reqwest::Url;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;

#[derive(Debug)]
pub struct ArtifactLoader {
    source: ArtifactSource,
    encoding: EncodingProfile,
    cached: OnceCell<LoadResult<ClassifierHandle>>,
    attempts: AtomicUsize,
}

impl ArtifactLoader {
    pub fn new(source: ArtifactSource, encoding: EncodingProfile) -> Self {
        Self {
            source,
            encoding,
            cached: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn from_config(cfg: &CoreConfig) -> Self {
        Self::new(cfg.artifact_source().clone(), cfg.encoding())
    }

    pub fn source(&self) -> &ArtifactSource {
        &self.source
    }

    /// Return the classifier, loading it on the first call.
    ///
    /// Concurrent first callers wait for the single in-flight load. If that load is cancelled
    /// before it completes, the next caller starts a fresh one.
    ///
    /// # Errors
    ///
    /// Returns the cached [`LoadError`] if the one load attempt failed.
    pub async fn load(&self) -> LoadResult<ClassifierHandle> {
        self.cached
            .get_or_init(|| async {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                let outcome = self.load_uncached().await;
                match &outcome {
                    Ok(handle) => tracing::info!(
                        source = %self.source,
                        kind = handle.kind(),
                        "model artifact loaded"
                    ),
                    Err(e) => tracing::error!(source = %self.source, "model artifact load failed: {e}"),
                }
                outcome
            })
            .await
            .clone()
    }

    /// The cached outcome, if a load has completed.
    pub fn cached(&self) -> Option<LoadResult<ClassifierHandle>> {
        self.cached.get().cloned()
    }

    /// Number of load attempts started so far.
    ///
    /// Once a load completes, success or failure, this stays fixed. A first load whose future is
    /// dropped before it finishes leaves nothing cached, so the next caller starts another
    /// attempt. The server binary loads eagerly at startup to avoid that.
    pub fn load_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn load_uncached(&self) -> LoadResult<ClassifierHandle> {
        let bytes = match &self.source {
            ArtifactSource::Local(path) => read_local(path).await?,
            ArtifactSource::Remote(url) => fetch_remote(url).await?,
        };

        let ParsedArtifact {
            classifier,
            declares_encoding,
        } = parse_artifact(&bytes, &self.encoding)?;

        if !declares_encoding {
            tracing::warn!(
                source = %self.source,
                "model artifact does not declare its categorical encoding; assuming the canonical ordinal encoding"
            );
        }

        Ok(classifier)
    }
}

async fn read_local(path: &Path) -> LoadResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}

async fn fetch_remote(url: &Url) -> LoadResult<Vec<u8>> {
    let fetch_error = |e: reqwest::Error| LoadError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    };

    let response = reqwest::get(url.clone()).await.map_err(fetch_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(fetch_error)?;
    Ok(bytes.to_vec())
}
