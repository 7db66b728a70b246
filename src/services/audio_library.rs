use std::path::PathBuf;

use tracing::instrument;

use crate::cache_store::CacheStore;
use crate::services::acquisition::AcquisitionCoordinator;
use crate::services::media_acquirer::{AcquisitionError, MediaAcquirer};
use crate::track::TrackKey;

/// Resolves a track to a complete cache entry, acquiring it on a miss.
pub struct AudioLibrary {
    store: CacheStore,
    acquirer: MediaAcquirer,
    coordinator: AcquisitionCoordinator<TrackKey, PathBuf, AcquisitionError>,
}

impl AudioLibrary {
    pub fn new(store: CacheStore, acquirer: MediaAcquirer) -> Self {
        Self {
            store,
            acquirer,
            coordinator: AcquisitionCoordinator::new(),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn get(&self, key: TrackKey) -> Result<PathBuf, AcquisitionError> {
        let path = self.store.resolve_path(&key);
        if self.store.exists(&path).await {
            tracing::debug!("Cache hit: {}", path.display());
            return Ok(path);
        }

        tracing::debug!("Cache miss, {} acquisitions in flight", self.coordinator.in_flight());
        let acquirer = self.acquirer.clone();
        self.coordinator
            .acquire(key.clone(), move || async move { acquirer.fetch(&key).await })
            .await
    }
}
