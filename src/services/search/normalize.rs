use std::collections::HashSet;

use crate::ports::catalog::CatalogItem;
use crate::services::search::model::{Collection, ItemList, SearchItem, SearchKind, Song};

/// Pulls a stable identifier out of a catalog item URL.
///
/// Markers are tried in order; the first one present wins and the id runs up
/// to the next `&` or `#`. Without a marker the last path segment is used.
#[derive(Debug, Clone)]
pub struct IdExtractor {
    markers: Vec<String>,
}

impl Default for IdExtractor {
    fn default() -> Self {
        Self::new(vec!["list=".to_string(), "v=".to_string()])
    }
}

impl IdExtractor {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    pub fn extract(&self, url: &str) -> Option<String> {
        for marker in &self.markers {
            if let Some((_, rest)) = url.split_once(marker.as_str()) {
                let id = rest.split(['&', '#']).next().unwrap_or_default();
                return non_empty(id);
            }
        }

        let path = url.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').find(|segment| !segment.is_empty()).and_then(non_empty)
    }
}

fn non_empty(id: &str) -> Option<String> {
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Trimmed, inner whitespace collapsed and lowercased.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Last path segment of an uploader URL such as `/channel/UCxyz`.
pub fn channel_id(uploader_url: &str) -> Option<String> {
    uploader_url
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .and_then(non_empty)
}

pub fn to_song(extractor: &IdExtractor, item: &CatalogItem, album: &str) -> Option<Song> {
    let id = extractor.extract(item.url.as_deref()?)?;
    Some(Song {
        id,
        title: item
            .title
            .clone()
            .or_else(|| item.name.clone())
            .unwrap_or_default(),
        artist: item.uploader_name.clone().unwrap_or_default(),
        artist_cover: String::new(),
        album: album.to_string(),
        cover: item.thumbnail.clone().unwrap_or_default(),
        duration: item.duration.unwrap_or_default(),
    })
}

fn to_collection(extractor: &IdExtractor, item: &CatalogItem) -> Option<Collection> {
    let id = extractor.extract(item.url.as_deref()?)?;
    Some(Collection {
        id,
        name: item
            .name
            .clone()
            .or_else(|| item.title.clone())
            .unwrap_or_default(),
        artist: item.uploader_name.clone().unwrap_or_default(),
        artist_cover: String::new(),
        cover: item.thumbnail.clone().unwrap_or_default(),
        songs: Vec::new(),
    })
}

/// Maps provider items of one kind, dropping items without an id and repeated ids.
pub fn to_item_list(extractor: &IdExtractor, kind: SearchKind, items: &[CatalogItem]) -> ItemList {
    let mut seen = HashSet::new();
    let mut list = Vec::with_capacity(items.len());

    for item in items {
        let converted = match kind {
            SearchKind::Songs => to_song(extractor, item, "").map(SearchItem::Song),
            SearchKind::Albums => to_collection(extractor, item).map(SearchItem::Album),
            SearchKind::Playlists => to_collection(extractor, item).map(SearchItem::Playlist),
        };
        let Some(converted) = converted else {
            tracing::debug!("Skipping {} item without id: {:?}", kind, item.url);
            continue;
        };
        if seen.insert(converted.id().to_string()) {
            list.push(converted);
        }
    }

    ItemList(list)
}

/// Members of an expanded collection, skipping entries without an id.
pub fn to_songs(extractor: &IdExtractor, items: &[CatalogItem], album: &str) -> Vec<Song> {
    items
        .iter()
        .filter_map(|item| to_song(extractor, item, album))
        .collect()
}
