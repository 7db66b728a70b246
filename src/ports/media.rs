use std::path::Path;

use crate::track::AudioFormat;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractError {
    #[error("{0} not found in PATH")]
    NotFound(String),
    #[error("Failed to start {tool}: {message}")]
    Spawn { tool: String, message: String },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
}

/// Port wrapping the external media-extraction tool.
///
/// Implementations live in `services::ytdlp` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Download `source_url` and write its audio as `format` to `output`.
    ///
    /// Success only means the tool reported success; callers must check the
    /// output themselves.
    async fn extract(
        &self,
        source_url: &str,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), ExtractError>;
}
