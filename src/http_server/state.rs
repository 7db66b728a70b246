use std::sync::Arc;

use tokio::sync::Notify;

use crate::services::audio_library::AudioLibrary;
use crate::services::provider_selector::ProviderSelector;
use crate::services::search::SearchService;
use crate::services::thumbnail::ThumbnailService;

pub struct AppState {
    pub library: Arc<AudioLibrary>,
    pub search: Arc<SearchService>,
    pub selector: Arc<ProviderSelector>,
    pub thumbnails: Arc<ThumbnailService>,
    /// Bytes sent for an open-ended range on `/stream`.
    pub chunk_size: u64,
    /// Wakes the provider refresh task.
    pub provider_refresh: Arc<Notify>,
}
