use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Semaphore;

use crate::ports::media::{ExtractError, MediaExtractor};
use crate::track::AudioFormat;

/// Extractor that blocks every call until `release` is called, so tests can
/// line up concurrent requests behind one extraction.
pub struct GatedExtractor {
    payload: Vec<u8>,
    calls: AtomicUsize,
    fail_next: AtomicBool,
    gate: Semaphore,
}

impl GatedExtractor {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    /// Let one pending (or the next) extraction finish.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait::async_trait]
impl MediaExtractor for GatedExtractor {
    async fn extract(
        &self,
        _source_url: &str,
        output: &Path,
        _format: AudioFormat,
    ) -> Result<(), ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            let _ = tokio::fs::write(output, b"partial").await;
            return Err(ExtractError::Failed {
                tool: "fake".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "ERROR: unavailable".to_string(),
            });
        }

        tokio::fs::write(output, &self.payload)
            .await
            .map_err(|e| ExtractError::Spawn {
                tool: "fake".to_string(),
                message: e.to_string(),
            })
    }
}
