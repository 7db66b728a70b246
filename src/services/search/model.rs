use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Songs,
    Albums,
    Playlists,
}

impl SearchKind {
    pub const ALL: [SearchKind; 3] = [SearchKind::Albums, SearchKind::Playlists, SearchKind::Songs];

    /// Filter name understood by the catalog's search endpoint.
    pub fn provider_filter(self) -> &'static str {
        match self {
            SearchKind::Songs => "music_songs",
            SearchKind::Albums => "music_albums",
            SearchKind::Playlists => "music_playlists",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchKind::Songs => "songs",
            SearchKind::Albums => "albums",
            SearchKind::Playlists => "playlists",
        }
    }
}

impl FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "songs" => Ok(SearchKind::Songs),
            "albums" => Ok(SearchKind::Albums),
            "playlists" => Ok(SearchKind::Playlists),
            other => Err(format!("Unknown filter: {other}")),
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Expand album and playlist members and album artist avatars.
    #[default]
    Full,
    Minimal,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(SearchMode::Full),
            "minimal" => Ok(SearchMode::Minimal),
            other => Err(format!("Unknown mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub artist_cover: String,
    pub album: String,
    pub cover: String,
    pub duration: i64,
}

/// An album or a playlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub artist_cover: String,
    pub cover: String,
    pub songs: Vec<Song>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SearchItem {
    Song(Song),
    Album(Collection),
    Playlist(Collection),
}

impl SearchItem {
    pub fn id(&self) -> &str {
        match self {
            SearchItem::Song(song) => &song.id,
            SearchItem::Album(collection) | SearchItem::Playlist(collection) => &collection.id,
        }
    }
}

/// Results of one kind, in display order.
///
/// Serialized as a JSON object keyed by item id; the order of the keys is the
/// order of the list, in both directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemList(pub Vec<SearchItem>);

impl ItemList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(SearchItem::id).collect()
    }
}

impl Serialize for ItemList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for item in &self.0 {
            map.serialize_entry(item.id(), item)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ItemList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ItemListVisitor;

        impl<'de> Visitor<'de> for ItemListVisitor {
            type Value = ItemList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of item id to search item")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ItemList, A::Error> {
                let mut items = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((_id, item)) = access.next_entry::<String, SearchItem>()? {
                    items.push(item);
                }
                Ok(ItemList(items))
            }
        }

        deserializer.deserialize_map(ItemListVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultSet {
    pub albums: ItemList,
    pub playlists: ItemList,
    pub songs: ItemList,
}

impl ResultSet {
    pub fn get(&self, kind: SearchKind) -> &ItemList {
        match kind {
            SearchKind::Songs => &self.songs,
            SearchKind::Albums => &self.albums,
            SearchKind::Playlists => &self.playlists,
        }
    }

    pub fn get_mut(&mut self, kind: SearchKind) -> &mut ItemList {
        match kind {
            SearchKind::Songs => &mut self.songs,
            SearchKind::Albums => &mut self.albums,
            SearchKind::Playlists => &mut self.playlists,
        }
    }

    /// Only the given kinds; the others are left empty.
    pub fn restricted_to(&self, kinds: &[SearchKind]) -> ResultSet {
        let mut restricted = ResultSet::default();
        for kind in kinds {
            *restricted.get_mut(*kind) = self.get(*kind).clone();
        }
        restricted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn song(id: &str) -> SearchItem {
        SearchItem::Song(Song {
            id: id.to_string(),
            title: format!("title {id}"),
            ..Default::default()
        })
    }

    #[test]
    fn test_item_list_serializes_as_ordered_map() {
        let results = ResultSet {
            songs: ItemList(vec![song("zzz"), song("aaa")]),
            ..Default::default()
        };

        let text = serde_json::to_string(&results).unwrap();
        assert!(text.find("\"zzz\"").unwrap() < text.find("\"aaa\"").unwrap());

        let value = serde_json::to_value(&results).unwrap();
        assert_eq!(value["songs"]["aaa"]["kind"], json!("song"));
        assert_eq!(value["songs"]["aaa"]["title"], json!("title aaa"));
        assert_eq!(value["albums"], json!({}));
    }

    #[test]
    fn test_item_list_deserialize_keeps_order() {
        let text = r#"{"songs":{"b":{"kind":"song","id":"b"},"a":{"kind":"song","id":"a"}}}"#;
        let results: ResultSet = serde_json::from_str(text).unwrap();
        assert_eq!(results.songs.ids(), vec!["b", "a"]);
        assert!(results.albums.is_empty());
    }

    #[test]
    fn test_collection_fields_are_camel_case() {
        let item = SearchItem::Album(Collection {
            id: "OLAK5".into(),
            artist_cover: "https://img/avatar.jpg".into(),
            ..Default::default()
        });
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["kind"], json!("album"));
        assert_eq!(value["artistCover"], json!("https://img/avatar.jpg"));
        assert_eq!(value["songs"], json!([]));
    }

    #[test]
    fn test_restricted_to() {
        let results = ResultSet {
            songs: ItemList(vec![song("a")]),
            albums: ItemList(vec![SearchItem::Album(Collection::default())]),
            ..Default::default()
        };
        let only_songs = results.restricted_to(&[SearchKind::Songs]);
        assert_eq!(only_songs.songs.len(), 1);
        assert!(only_songs.albums.is_empty());
    }

    #[test]
    fn test_search_kind_from_str() {
        assert_eq!("albums".parse::<SearchKind>().unwrap(), SearchKind::Albums);
        assert!("videos".parse::<SearchKind>().is_err());
        assert_eq!("minimal".parse::<SearchMode>().unwrap(), SearchMode::Minimal);
    }
}
