use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinError;
use tracing::instrument;

use crate::cache_store::{CacheError, CacheStore, staging_prefix};
use crate::ports::media::{ExtractError, MediaExtractor};
use crate::track::{TrackId, TrackKey};

#[derive(Debug, Clone, thiserror::Error)]
pub enum AcquisitionError {
    #[error("Extraction tool failed: {0}")]
    ToolFailed(String),

    #[error("Extraction tool unavailable: {0}")]
    ToolNotFound(String),

    #[error("Extraction finished but produced no output at {path}")]
    OutputMissing { path: String },

    #[error("File system error during {operation} on {path}: {error_message}")]
    FileSystem {
        operation: String,
        path: String,
        error_message: String,
    },

    #[error("Acquisition aborted: {0}")]
    Aborted(String),
}

impl From<ExtractError> for AcquisitionError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::NotFound(tool) => AcquisitionError::ToolNotFound(tool),
            other => AcquisitionError::ToolFailed(other.to_string()),
        }
    }
}

impl From<CacheError> for AcquisitionError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::FileSystem {
                operation,
                path,
                error_message,
            } => AcquisitionError::FileSystem {
                operation,
                path,
                error_message,
            },
        }
    }
}

impl From<JoinError> for AcquisitionError {
    fn from(err: JoinError) -> Self {
        AcquisitionError::Aborted(err.to_string())
    }
}

/// Produces cache entries by running the extraction tool.
///
/// The tool writes to a hidden staging file; only a non-empty result is
/// renamed to the entry path. Anything the tool leaves behind on failure is
/// removed before the error is returned.
#[derive(Clone)]
pub struct MediaAcquirer {
    store: CacheStore,
    extractor: Arc<dyn MediaExtractor>,
    source_url_template: String,
}

impl MediaAcquirer {
    pub fn new(
        store: CacheStore,
        extractor: Arc<dyn MediaExtractor>,
        source_url_template: String,
    ) -> Self {
        Self {
            store,
            extractor,
            source_url_template,
        }
    }

    pub fn source_url(&self, id: &TrackId) -> String {
        self.source_url_template.replace("{id}", id.as_str())
    }

    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn fetch(&self, key: &TrackKey) -> Result<PathBuf, AcquisitionError> {
        let path = self.store.resolve_path(key);
        if self.store.exists(&path).await {
            tracing::debug!("Already cached: {}", path.display());
            return Ok(path);
        }

        self.store.ensure_directories(key.tier).await?;
        let directory = self.store.tier_directory(key.tier);
        let prefix = staging_prefix(&key.id);
        // Leftovers from a run that was killed mid-extraction
        remove_debris(&directory, &prefix).await;

        let source_url = self.source_url(&key.id);
        tracing::info!("Downloading: {}", source_url);
        let started = Instant::now();

        match self.extract_into_place(key, &source_url, &path).await {
            Ok(()) => {
                let size = tokio::fs::metadata(&path)
                    .await
                    .map(|m| m.len())
                    .unwrap_or_default();
                tracing::info!(
                    "Download complete: {} | Size: {:.2} MB | Duration: {} ms",
                    path.display(),
                    size as f64 / (1024.0 * 1024.0),
                    started.elapsed().as_millis()
                );
                Ok(path)
            }
            Err(e) => {
                remove_debris(&directory, &prefix).await;
                tracing::error!("Download failed for {}: {}", key, e);
                Err(e)
            }
        }
    }

    async fn extract_into_place(
        &self,
        key: &TrackKey,
        source_url: &str,
        path: &Path,
    ) -> Result<(), AcquisitionError> {
        let staging = self.store.staging_path(key);

        self.extractor
            .extract(source_url, &staging, key.tier.format())
            .await?;

        if !self.store.exists(&staging).await {
            return Err(AcquisitionError::OutputMissing {
                path: staging.display().to_string(),
            });
        }

        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| AcquisitionError::FileSystem {
                operation: "rename".to_string(),
                path: path.display().to_string(),
                error_message: e.to_string(),
            })
    }
}

/// Removes every file in `directory` whose name starts with `prefix`.
pub async fn remove_debris(directory: &Path, prefix: &str) {
    let mut entries = match tokio::fs::read_dir(directory).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to list {}: {}", directory.display(), e);
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to list {}: {}", directory.display(), e);
                break;
            }
        };
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!("Removed partial file: {}", path.display()),
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}
