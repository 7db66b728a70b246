use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::persistence::{load_json, save_json};
use crate::services::search::model::{ResultSet, SearchKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRecord {
    pub results: ResultSet,
    /// Kinds whose collections carry their members and artist avatars.
    pub expanded: Vec<SearchKind>,
    /// Milliseconds since the epoch of the last merge.
    pub timestamp: i64,
}

impl QueryRecord {
    pub fn is_expanded(&self, kind: SearchKind) -> bool {
        self.expanded.contains(&kind)
    }
}

pub type Records = HashMap<String, QueryRecord>;
pub type Weights = HashMap<String, HashMap<String, u32>>;

/// The two persisted search documents.
///
/// Each document is loaded lazily on first use and kept in memory behind its
/// own lock; every mutation rewrites the whole file while the lock is held.
pub struct SearchStore {
    records_file: PathBuf,
    weights_file: PathBuf,
    records: Mutex<Option<Records>>,
    weights: Mutex<Option<Weights>>,
}

impl SearchStore {
    pub fn new(records_file: PathBuf, weights_file: PathBuf) -> Self {
        Self {
            records_file,
            weights_file,
            records: Mutex::new(None),
            weights: Mutex::new(None),
        }
    }

    pub async fn record(&self, query: &str) -> Option<QueryRecord> {
        let mut guard = self.records.lock().await;
        let records = Self::loaded(&mut *guard, &self.records_file).await;
        records.get(query).cloned()
    }

    /// Writes the fetched kinds into the record for `query`, leaving other
    /// kinds as they are, and returns the merged record. `expanded` says
    /// whether the fetched collections went through full expansion.
    pub async fn merge(
        &self,
        query: &str,
        fetched: &ResultSet,
        kinds: &[SearchKind],
        expanded: bool,
    ) -> QueryRecord {
        let mut guard = self.records.lock().await;
        let records = Self::loaded(&mut *guard, &self.records_file).await;

        let record = records.entry(query.to_string()).or_default();
        for kind in kinds {
            *record.results.get_mut(*kind) = fetched.get(*kind).clone();
            record.expanded.retain(|k| k != kind);
            if expanded {
                record.expanded.push(*kind);
            }
        }
        record.timestamp = chrono::Utc::now().timestamp_millis();
        let merged = record.clone();

        if let Err(e) = save_json(&self.records_file, &*records).await {
            tracing::error!("Failed to persist search cache: {}", e);
        }
        merged
    }

    pub async fn weights_for(&self, query: &str) -> HashMap<String, u32> {
        let mut guard = self.weights.lock().await;
        let weights = Self::loaded(&mut *guard, &self.weights_file).await;
        weights.get(query).cloned().unwrap_or_default()
    }

    /// Bumps the counter for `(query, id)` and returns the new value.
    pub async fn increment_weight(&self, query: &str, id: &str) -> u32 {
        let mut guard = self.weights.lock().await;
        let weights = Self::loaded(&mut *guard, &self.weights_file).await;

        let counter = weights
            .entry(query.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert(0);
        *counter = counter.saturating_add(1);
        let weight = *counter;

        if let Err(e) = save_json(&self.weights_file, &*weights).await {
            tracing::error!("Failed to persist search weights: {}", e);
        }
        weight
    }

    async fn loaded<'a, T>(slot: &'a mut Option<T>, path: &std::path::Path) -> &'a mut T
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if slot.is_none() {
            *slot = Some(load_json(path).await);
        }
        slot.get_or_insert_with(T::default)
    }
}
