use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use reqwest::Client;
use tokio::process::Command;
use tracing::instrument;

use crate::cache_store::{CacheStore, staging_prefix};
use crate::ports::media::ExtractError;
use crate::ports::thumbnail::{ThumbnailError, ThumbnailSource};
use crate::services::acquisition::AcquisitionCoordinator;
use crate::services::media_acquirer::{AcquisitionError, remove_debris};
use crate::services::ytdlp::stderr_tail;
use crate::track::TrackId;

/// Centered square of the largest possible size.
const SQUARE_CROP: &str = r"crop=min(iw\,ih):min(iw\,ih)";

impl From<ThumbnailError> for AcquisitionError {
    fn from(err: ThumbnailError) -> Self {
        match err {
            ThumbnailError::Crop(e) => e.into(),
            ThumbnailError::FileSystem { path, message } => AcquisitionError::FileSystem {
                operation: "write thumbnail".to_string(),
                path,
                error_message: message,
            },
            other => AcquisitionError::ToolFailed(other.to_string()),
        }
    }
}

/// Square track artwork, cached as `thumbnails/{id}.webp`.
pub struct ThumbnailService {
    store: CacheStore,
    source: Arc<dyn ThumbnailSource>,
    coordinator: AcquisitionCoordinator<TrackId, PathBuf, AcquisitionError>,
}

impl ThumbnailService {
    pub fn new(store: CacheStore, source: Arc<dyn ThumbnailSource>) -> Self {
        Self {
            store,
            source,
            coordinator: AcquisitionCoordinator::new(),
        }
    }

    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn thumbnail(&self, id: &TrackId) -> Result<PathBuf, AcquisitionError> {
        let path = self.store.thumbnail_path(id);
        if self.store.exists(&path).await {
            return Ok(path);
        }

        let store = self.store.clone();
        let source = self.source.clone();
        let id = id.clone();
        self.coordinator
            .acquire(id.clone(), move || async move {
                fetch_into_cache(&store, source.as_ref(), &id).await
            })
            .await
    }
}

async fn fetch_into_cache(
    store: &CacheStore,
    source: &dyn ThumbnailSource,
    id: &TrackId,
) -> Result<PathBuf, AcquisitionError> {
    let path = store.thumbnail_path(id);
    if store.exists(&path).await {
        return Ok(path);
    }

    store.ensure_thumbnail_directory().await?;
    let directory = store.thumbnail_directory();
    let prefix = staging_prefix(id);
    let staging = store.thumbnail_staging_path(id);

    let result = async {
        source.fetch_square(id.as_str(), &staging).await?;
        if !store.exists(&staging).await {
            return Err(AcquisitionError::OutputMissing {
                path: staging.display().to_string(),
            });
        }
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| AcquisitionError::FileSystem {
                operation: "rename".to_string(),
                path: path.display().to_string(),
                error_message: e.to_string(),
            })
    }
    .await;

    match result {
        Ok(()) => {
            tracing::info!("Thumbnail cached: {}", path.display());
            Ok(path)
        }
        Err(e) => {
            remove_debris(&directory, &prefix).await;
            tracing::error!("Thumbnail failed for {}: {}", id, e);
            Err(e)
        }
    }
}

/// Downloads the video thumbnail and crops it with ffmpeg.
pub struct YtimgThumbnailSource {
    client: Client,
    ffmpeg: String,
    url_template: String,
}

impl YtimgThumbnailSource {
    pub fn new(client: Client, ffmpeg: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            client,
            ffmpeg: ffmpeg.into(),
            url_template: url_template.into(),
        }
    }

    pub fn image_url(&self, id: &str) -> String {
        self.url_template.replace("{id}", id)
    }

    async fn download(&self, url: &str, target: &Path) -> Result<(), ThumbnailError> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ThumbnailError::Download(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| ThumbnailError::Download(e.to_string()))?;

        tokio::fs::write(target, &bytes)
            .await
            .map_err(|e| ThumbnailError::FileSystem {
                path: target.display().to_string(),
                message: e.to_string(),
            })
    }

    async fn crop(&self, input: &Path, output: &Path) -> Result<(), ExtractError> {
        let binary =
            which::which(&self.ffmpeg).map_err(|_| ExtractError::NotFound(self.ffmpeg.clone()))?;
        let args = crop_args(input, output);

        let result = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExtractError::Spawn {
                tool: self.ffmpeg.clone(),
                message: e.to_string(),
            })?;

        if !result.status.success() {
            return Err(ExtractError::Failed {
                tool: self.ffmpeg.clone(),
                status: result.status.to_string(),
                stderr: stderr_tail(&result.stderr),
            });
        }
        Ok(())
    }
}

pub fn crop_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vf".to_string(),
        SQUARE_CROP.to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-c:v".to_string(),
        "libwebp".to_string(),
        "-f".to_string(),
        "webp".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

#[async_trait::async_trait]
impl ThumbnailSource for YtimgThumbnailSource {
    async fn fetch_square(&self, id: &str, output: &Path) -> Result<(), ThumbnailError> {
        // Shares the staging prefix, so failure cleanup catches it too.
        let original = output.with_extension("jpg");
        let url = self.image_url(id);
        tracing::debug!("Fetching thumbnail: {}", url);

        self.download(&url, &original).await?;
        let cropped = self.crop(&original, output).await;
        if let Err(e) = tokio::fs::remove_file(&original).await {
            tracing::warn!("Failed to remove {}: {}", original.display(), e);
        }
        cropped.map_err(ThumbnailError::Crop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::thumbnail::MockThumbnailSource;
    use tempfile::TempDir;

    fn id(value: &str) -> TrackId {
        TrackId::parse(value).unwrap()
    }

    #[tokio::test]
    async fn test_miss_fetches_and_caches() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source
            .expect_fetch_square()
            .withf(|id, output| {
                id == "abc123" && output.ends_with("thumbnails/.abc123.partial.webp")
            })
            .times(1)
            .returning(|_, output| {
                std::fs::write(output, b"RIFF....WEBP").unwrap();
                Ok(())
            });
        let store = CacheStore::new(dir.path());
        let service = ThumbnailService::new(store.clone(), Arc::new(source));

        let first = service.thumbnail(&id("abc123")).await.unwrap();
        let second = service.thumbnail(&id("abc123")).await.unwrap();

        assert_eq!(first, store.thumbnail_path(&id("abc123")));
        assert_eq!(first, second);
        assert_eq!(std::fs::read(first).unwrap(), b"RIFF....WEBP");
    }

    #[tokio::test]
    async fn test_failure_leaves_no_debris() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source.expect_fetch_square().times(1).returning(|_, output| {
            std::fs::write(output.with_extension("jpg"), b"jpeg").unwrap();
            Err(ThumbnailError::Crop(ExtractError::Failed {
                tool: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Invalid data".to_string(),
            }))
        });
        let store = CacheStore::new(dir.path());
        let service = ThumbnailService::new(store.clone(), Arc::new(source));

        let err = service.thumbnail(&id("abc123")).await.unwrap_err();

        assert!(matches!(err, AcquisitionError::ToolFailed(_)));
        let leftovers = std::fs::read_dir(store.thumbnail_directory()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_empty_output_is_missing() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source.expect_fetch_square().returning(|_, output| {
            std::fs::write(output, b"").unwrap();
            Ok(())
        });
        let service = ThumbnailService::new(CacheStore::new(dir.path()), Arc::new(source));

        let err = service.thumbnail(&id("abc123")).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::OutputMissing { .. }));
    }

    #[test]
    fn test_crop_args() {
        let args = crop_args(
            Path::new("/cache/thumbnails/.abc.partial.jpg"),
            Path::new("/cache/thumbnails/.abc.partial.webp"),
        );
        let filter_at = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[filter_at + 1], r"crop=min(iw\,ih):min(iw\,ih)");
        assert_eq!(args.last().unwrap(), "/cache/thumbnails/.abc.partial.webp");
    }

    #[test]
    fn test_image_url() {
        let source = YtimgThumbnailSource::new(
            Client::new(),
            "ffmpeg",
            "https://i3.ytimg.com/vi/{id}/maxresdefault.jpg",
        );
        assert_eq!(
            source.image_url("abc123"),
            "https://i3.ytimg.com/vi/abc123/maxresdefault.jpg"
        );
    }
}
