use serde::{Deserialize, Serialize};

/// One entry of the public mirror list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInstance {
    pub name: String,
    pub api_url: String,
}

/// An item as returned by the catalog's search and collection endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogItem {
    pub url: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub uploader_name: Option<String>,
    pub uploader_url: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionPage {
    pub name: Option<String>,
    pub related_streams: Vec<CatalogItem>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Request failed: {0}")]
    Http(String),
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Timed out")]
    Timeout,
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout
        } else if err.is_decode() {
            CatalogError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            CatalogError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            CatalogError::Http(err.to_string())
        }
    }
}

/// Port wrapping the remote catalog (a Piped-compatible API mirror).
///
/// Every call takes the mirror's base URL so the selector can switch mirrors
/// without rebuilding the client. Implementations live in `services::piped`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// `filter` is the provider's own filter name, e.g. `music_songs`.
    async fn search(
        &self,
        base_url: &str,
        query: &str,
        filter: &str,
    ) -> Result<Vec<CatalogItem>, CatalogError>;

    /// Members of an album or playlist.
    async fn collection(&self, base_url: &str, id: &str) -> Result<CollectionPage, CatalogError>;

    async fn channel_avatar(&self, base_url: &str, channel_id: &str)
    -> Result<String, CatalogError>;

    async fn list_instances(
        &self,
        instances_url: &str,
    ) -> Result<Vec<ProviderInstance>, CatalogError>;

    async fn healthcheck(&self, base_url: &str) -> Result<(), CatalogError>;
}
