use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{join, join_all};
use tokio::time::Instant;
use tracing::instrument;

use crate::ports::catalog::{CatalogError, CatalogItem, CatalogProvider};
use crate::services::provider_selector::ProviderSelector;
use crate::services::search::model::{ItemList, ResultSet, SearchItem, SearchKind, SearchMode, Song};
use crate::services::search::normalize::{
    IdExtractor, channel_id, normalize_query, to_item_list, to_songs,
};
use crate::services::search::store::{QueryRecord, SearchStore};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Query must not be empty")]
    InvalidQuery,
    #[error("Selected id must not be empty")]
    InvalidSelection,
    #[error("No provider answered the search")]
    ProviderUnavailable,
}

/// Cached, weighted search over the active catalog mirror.
pub struct SearchService {
    catalog: Arc<dyn CatalogProvider>,
    selector: Arc<ProviderSelector>,
    store: SearchStore,
    extractor: IdExtractor,
}

impl SearchService {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        selector: Arc<ProviderSelector>,
        store: SearchStore,
        extractor: IdExtractor,
    ) -> Self {
        Self {
            catalog,
            selector,
            store,
            extractor,
        }
    }

    /// Results for `query`, limited to `kinds` (all kinds when empty).
    ///
    /// Kinds with a non-empty cached list are served from the cache; the rest
    /// are fetched concurrently and merged into the record. A kind that fails
    /// to fetch comes back empty. The search only fails when nothing at all
    /// could be answered.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        kinds: &[SearchKind],
        mode: SearchMode,
    ) -> Result<ResultSet, SearchError> {
        let started = Instant::now();
        let query = normalize_query(query);
        if query.is_empty() {
            return Err(SearchError::InvalidQuery);
        }
        let kinds = requested_kinds(kinds);

        let record = self.store.record(&query).await.unwrap_or_default();
        let (cached, missing): (Vec<SearchKind>, Vec<SearchKind>) = kinds
            .iter()
            .copied()
            .partition(|kind| is_reusable(&record, *kind, mode));
        let mut results = record.results;

        if !missing.is_empty() {
            let base_url = self.selector.current();
            let outcomes = join_all(
                missing
                    .iter()
                    .map(|kind| self.fetch_kind(&base_url, &query, *kind, mode)),
            )
            .await;

            let mut fetched = ResultSet::default();
            let mut fetched_kinds = Vec::new();
            for (kind, outcome) in missing.iter().zip(outcomes) {
                match outcome {
                    Ok(list) => {
                        *fetched.get_mut(*kind) = list;
                        fetched_kinds.push(*kind);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Fetching {} for \"{}\" from {} failed: {}",
                            kind,
                            query,
                            base_url,
                            e
                        );
                    }
                }
            }

            if fetched_kinds.is_empty() && cached.is_empty() {
                return Err(SearchError::ProviderUnavailable);
            }
            if !fetched_kinds.is_empty() {
                results = self
                    .store
                    .merge(&query, &fetched, &fetched_kinds, mode == SearchMode::Full)
                    .await
                    .results;
            }
        }

        let mut results = results.restricted_to(&kinds);
        let weights = self.store.weights_for(&query).await;
        for kind in &kinds {
            apply_weights(results.get_mut(*kind), &weights);
        }

        tracing::info!(
            "Search: \"{}\" | Cached: {} | Fetched: {} | Mode: {:?} | Duration: {} ms",
            query,
            join_kinds(&cached),
            join_kinds(&missing),
            mode,
            started.elapsed().as_millis()
        );
        Ok(results)
    }

    /// Counts one selection of `id` for `query` and returns the new weight.
    #[instrument(skip(self))]
    pub async fn record_selection(&self, query: &str, id: &str) -> Result<u32, SearchError> {
        let query = normalize_query(query);
        if query.is_empty() {
            return Err(SearchError::InvalidQuery);
        }
        let id = id.trim();
        if id.is_empty() {
            return Err(SearchError::InvalidSelection);
        }

        let weight = self.store.increment_weight(&query, id).await;
        tracing::debug!("Weight for \"{}\" / {} is now {}", query, id, weight);
        Ok(weight)
    }

    async fn fetch_kind(
        &self,
        base_url: &str,
        query: &str,
        kind: SearchKind,
        mode: SearchMode,
    ) -> Result<ItemList, CatalogError> {
        let items = self
            .catalog
            .search(base_url, query, kind.provider_filter())
            .await?;
        let mut list = to_item_list(&self.extractor, kind, &items);

        if mode == SearchMode::Full && kind != SearchKind::Songs {
            let uploaders = self.uploader_urls(&items);
            self.expand(base_url, &mut list, &uploaders).await;
        }
        Ok(list)
    }

    fn uploader_urls(&self, items: &[CatalogItem]) -> HashMap<String, String> {
        items
            .iter()
            .filter_map(|item| {
                let id = self.extractor.extract(item.url.as_deref()?)?;
                Some((id, item.uploader_url.clone()?))
            })
            .collect()
    }

    /// Fills collection members and album artist avatars. Failures only leave
    /// the fields empty.
    async fn expand(
        &self,
        base_url: &str,
        list: &mut ItemList,
        uploaders: &HashMap<String, String>,
    ) {
        join_all(list.0.iter_mut().map(|item| async move {
            match item {
                SearchItem::Album(album) => {
                    let channel = uploaders.get(&album.id).and_then(|url| channel_id(url));
                    let (songs, avatar) = join(
                        self.members(base_url, &album.id, true),
                        self.avatar(base_url, channel.as_deref()),
                    )
                    .await;
                    album.songs = songs;
                    album.artist_cover = avatar;
                }
                SearchItem::Playlist(playlist) => {
                    playlist.songs = self.members(base_url, &playlist.id, false).await;
                }
                SearchItem::Song(_) => {}
            }
        }))
        .await;
    }

    async fn members(&self, base_url: &str, id: &str, is_album: bool) -> Vec<Song> {
        match self.catalog.collection(base_url, id).await {
            Ok(page) => {
                let album = if is_album {
                    page.name.unwrap_or_default()
                } else {
                    String::new()
                };
                to_songs(&self.extractor, &page.related_streams, &album)
            }
            Err(e) => {
                tracing::warn!("Fetching members of {} failed: {}", id, e);
                Vec::new()
            }
        }
    }

    async fn avatar(&self, base_url: &str, channel: Option<&str>) -> String {
        let Some(channel) = channel else {
            return String::new();
        };
        match self.catalog.channel_avatar(base_url, channel).await {
            Ok(avatar) => avatar,
            Err(e) => {
                tracing::warn!("Fetching avatar of {} failed: {}", channel, e);
                String::new()
            }
        }
    }
}

/// A cached kind is served as is unless it is empty, or a full search would
/// get back collections stored without their members.
fn is_reusable(record: &QueryRecord, kind: SearchKind, mode: SearchMode) -> bool {
    if record.results.get(kind).is_empty() {
        return false;
    }
    mode == SearchMode::Minimal || kind == SearchKind::Songs || record.is_expanded(kind)
}

fn requested_kinds(kinds: &[SearchKind]) -> Vec<SearchKind> {
    if kinds.is_empty() {
        return SearchKind::ALL.to_vec();
    }
    let mut unique = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !unique.contains(kind) {
            unique.push(*kind);
        }
    }
    unique
}

/// Heavier items first; equal weights keep their current order.
fn apply_weights(list: &mut ItemList, weights: &HashMap<String, u32>) {
    if weights.is_empty() {
        return;
    }
    list.0
        .sort_by_key(|item| Reverse(weights.get(item.id()).copied().unwrap_or(0)));
}

fn join_kinds(kinds: &[SearchKind]) -> String {
    if kinds.is_empty() {
        return "none".to_string();
    }
    kinds
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
