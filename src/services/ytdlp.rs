use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::ports::media::{ExtractError, MediaExtractor};
use crate::track::AudioFormat;

const STDERR_TAIL: usize = 2000;

pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn resolve_binary(&self) -> Result<PathBuf, ExtractError> {
        which::which(&self.binary).map_err(|_| ExtractError::NotFound(self.binary.clone()))
    }
}

/// yt-dlp picks the extension itself after post-processing, so the output is
/// passed as a template with `%(ext)s` in place of the final extension.
pub fn output_template(output: &Path) -> String {
    output
        .with_extension("%(ext)s")
        .to_string_lossy()
        .to_string()
}

pub fn extract_args(source_url: &str, output: &Path, format: AudioFormat) -> Vec<String> {
    vec![
        source_url.to_string(),
        "--extract-audio".to_string(),
        "--audio-format".to_string(),
        format.extension().to_string(),
        "--no-playlist".to_string(),
        "--no-progress".to_string(),
        "--quiet".to_string(),
        "--output".to_string(),
        output_template(output),
    ]
}

/// Keep the end of stderr; that's where yt-dlp puts the actual error.
pub fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().rev().nth(STDERR_TAIL) {
        Some((idx, _)) => text[idx..].to_string(),
        None => text.to_string(),
    }
}

#[async_trait::async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(
        &self,
        source_url: &str,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), ExtractError> {
        let binary = self.resolve_binary()?;
        let args = extract_args(source_url, output, format);
        tracing::debug!("Running {} {}", binary.display(), args.join(" "));

        let result = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExtractError::Spawn {
                tool: self.binary.clone(),
                message: e.to_string(),
            })?;

        if !result.status.success() {
            return Err(ExtractError::Failed {
                tool: self.binary.clone(),
                status: result.status.to_string(),
                stderr: stderr_tail(&result.stderr),
            });
        }

        Ok(())
    }
}
