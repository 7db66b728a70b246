use std::path::Path;

use crate::ports::media::ExtractError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Failed to download thumbnail: {0}")]
    Download(String),
    #[error("Failed to crop thumbnail: {0}")]
    Crop(#[from] ExtractError),
    #[error("File system error on {path}: {message}")]
    FileSystem { path: String, message: String },
}

/// Port for fetching a track's artwork as a square image.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ThumbnailSource: Send + Sync {
    /// Write a centered square crop of the artwork for `id` to `output` as WebP.
    async fn fetch_square(&self, id: &str, output: &Path) -> Result<(), ThumbnailError>;
}
