use std::path::{Path, PathBuf};

use crate::track::{Tier, TrackId, TrackKey};

const THUMBNAILS_DIR: &str = "thumbnails";
const THUMBNAIL_EXTENSION: &str = "webp";
const SEARCH_CACHE_FILE: &str = "search_cache.json";
const SEARCH_WEIGHTS_FILE: &str = "search_weights.json";

#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("File system error during {operation} on {path}: {error_message}")]
    FileSystem {
        operation: String,
        path: String,
        error_message: String,
    },
}

impl CacheError {
    pub fn file_system(operation: &str, path: &Path, err: std::io::Error) -> Self {
        Self::FileSystem {
            operation: operation.to_string(),
            path: path.display().to_string(),
            error_message: err.to_string(),
        }
    }
}

/// On-disk layout of the cache root.
///
/// ```text
/// {root}/compressed/{id}.mp3
/// {root}/lossless/{id}.flac
/// {root}/thumbnails/{id}.webp
/// {root}/search_cache.json
/// {root}/search_weights.json
/// ```
///
/// A file at one of the entry paths is only ever produced by renaming a
/// finished staging file into place, so a non-empty file is a complete one.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn tier_directory(&self, tier: Tier) -> PathBuf {
        self.root.join(tier.directory())
    }

    pub fn resolve_path(&self, key: &TrackKey) -> PathBuf {
        self.tier_directory(key.tier)
            .join(format!("{}.{}", key.id, key.tier.format().extension()))
    }

    /// Where an acquisition writes before the result is moved to `resolve_path`.
    /// Hidden, so it can never be mistaken for an entry.
    pub fn staging_path(&self, key: &TrackKey) -> PathBuf {
        self.tier_directory(key.tier).join(format!(
            "{}.{}",
            staging_prefix(&key.id),
            key.tier.format().extension()
        ))
    }

    pub fn thumbnail_directory(&self) -> PathBuf {
        self.root.join(THUMBNAILS_DIR)
    }

    pub fn thumbnail_path(&self, id: &TrackId) -> PathBuf {
        self.thumbnail_directory()
            .join(format!("{}.{}", id, THUMBNAIL_EXTENSION))
    }

    pub fn thumbnail_staging_path(&self, id: &TrackId) -> PathBuf {
        self.thumbnail_directory()
            .join(format!("{}.{}", staging_prefix(id), THUMBNAIL_EXTENSION))
    }

    pub fn search_cache_file(&self) -> PathBuf {
        self.root.join(SEARCH_CACHE_FILE)
    }

    pub fn search_weights_file(&self) -> PathBuf {
        self.root.join(SEARCH_WEIGHTS_FILE)
    }

    /// True when `path` is a regular, non-empty file.
    pub async fn exists(&self, path: &Path) -> bool {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.is_file() && metadata.len() > 0,
            Err(_) => false,
        }
    }

    pub async fn ensure_directories(&self, tier: Tier) -> Result<(), CacheError> {
        let dir = self.tier_directory(tier);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::file_system("create directory", &dir, e))
    }

    pub async fn ensure_thumbnail_directory(&self) -> Result<(), CacheError> {
        let dir = self.thumbnail_directory();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::file_system("create directory", &dir, e))
    }
}

/// File name prefix shared by a staging file and whatever the extraction tool
/// leaves next to it.
pub fn staging_prefix(id: &TrackId) -> String {
    format!(".{}.partial", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn key(id: &str, tier: Tier) -> TrackKey {
        TrackKey::new(TrackId::parse(id).unwrap(), tier)
    }

    #[test]
    fn test_resolve_path_layout() {
        let store = CacheStore::new("/cache");
        assert_eq!(
            store.resolve_path(&key("abc123", Tier::Compressed)),
            PathBuf::from("/cache/compressed/abc123.mp3")
        );
        assert_eq!(
            store.resolve_path(&key("abc123", Tier::Lossless)),
            PathBuf::from("/cache/lossless/abc123.flac")
        );
    }

    #[test]
    fn test_resolve_path_is_deterministic_and_injective() {
        let store = CacheStore::new("/cache");
        let ids = ["a", "b", "a-b", "a_b", "ab", "AB", "abc123"];

        let mut seen = HashSet::new();
        for id in ids {
            for tier in Tier::ALL {
                let k = key(id, tier);
                assert_eq!(store.resolve_path(&k), store.resolve_path(&k));
                assert!(seen.insert(store.resolve_path(&k)), "collision for {k}");
            }
        }
    }

    #[test]
    fn test_staging_path_never_matches_entry() {
        let store = CacheStore::new("/cache");
        let k = key("abc123", Tier::Compressed);
        let staging = store.staging_path(&k);
        assert_ne!(staging, store.resolve_path(&k));
        assert_eq!(staging.parent(), store.resolve_path(&k).parent());
        assert!(
            staging
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(".abc123.partial")
        );
    }

    #[tokio::test]
    async fn test_exists_requires_non_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let k = key("abc123", Tier::Compressed);
        let path = store.resolve_path(&k);

        assert!(!store.exists(&path).await);

        store.ensure_directories(Tier::Compressed).await.unwrap();
        std::fs::write(&path, b"").unwrap();
        assert!(!store.exists(&path).await);

        std::fs::write(&path, b"ID3").unwrap();
        assert!(store.exists(&path).await);
    }

    #[tokio::test]
    async fn test_ensure_directories_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());

        store.ensure_directories(Tier::Lossless).await.unwrap();
        store.ensure_directories(Tier::Lossless).await.unwrap();

        assert!(dir.path().join("lossless").is_dir());
        assert!(!dir.path().join("compressed").exists());
    }

    #[tokio::test]
    async fn test_ensure_directories_reports_file_system_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("root");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = CacheStore::new(&blocker);

        let err = store.ensure_directories(Tier::Compressed).await.unwrap_err();
        assert!(matches!(err, CacheError::FileSystem { .. }));
    }
}
