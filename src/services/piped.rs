use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::ports::catalog::{
    CatalogError, CatalogItem, CatalogProvider, CollectionPage, ProviderInstance,
};

/* ---------- Responses ---------- */

/// `GET /search`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    items: Vec<CatalogItem>,
}

/// `GET /channel/{id}`; only the avatar is used.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ChannelResponse {
    avatar_url: Option<String>,
}

/* ---------- Endpoints ---------- */

fn endpoint(base_url: &str, path: &str) -> Result<Url, CatalogError> {
    let joined = format!("{}/{}", base_url.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| CatalogError::Http(format!("Invalid URL {joined}: {e}")))
}

pub fn search_url(base_url: &str, query: &str, filter: &str) -> Result<Url, CatalogError> {
    let mut url = endpoint(base_url, "search")?;
    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("filter", filter);
    Ok(url)
}

pub fn collection_url(base_url: &str, id: &str) -> Result<Url, CatalogError> {
    let mut url = endpoint(base_url, "playlists")?;
    url.path_segments_mut()
        .map_err(|_| CatalogError::Http(format!("Invalid base URL {base_url}")))?
        .push(id);
    Ok(url)
}

pub fn channel_url(base_url: &str, channel_id: &str) -> Result<Url, CatalogError> {
    let mut url = endpoint(base_url, "channel")?;
    url.path_segments_mut()
        .map_err(|_| CatalogError::Http(format!("Invalid base URL {base_url}")))?
        .push(channel_id);
    Ok(url)
}

/* ---------- Client ---------- */

/// HTTP adapter for Piped-compatible API mirrors.
pub struct PipedClient {
    client: Client,
}

impl PipedClient {
    pub fn new(request_timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait::async_trait]
impl CatalogProvider for PipedClient {
    async fn search(
        &self,
        base_url: &str,
        query: &str,
        filter: &str,
    ) -> Result<Vec<CatalogItem>, CatalogError> {
        let response: SearchResponse = self.get_json(search_url(base_url, query, filter)?).await?;
        Ok(response.items)
    }

    async fn collection(&self, base_url: &str, id: &str) -> Result<CollectionPage, CatalogError> {
        self.get_json(collection_url(base_url, id)?).await
    }

    async fn channel_avatar(
        &self,
        base_url: &str,
        channel_id: &str,
    ) -> Result<String, CatalogError> {
        let response: ChannelResponse = self.get_json(channel_url(base_url, channel_id)?).await?;
        response
            .avatar_url
            .ok_or_else(|| CatalogError::Decode(format!("No avatarUrl for channel {channel_id}")))
    }

    async fn list_instances(
        &self,
        instances_url: &str,
    ) -> Result<Vec<ProviderInstance>, CatalogError> {
        let url = Url::parse(instances_url)
            .map_err(|e| CatalogError::Http(format!("Invalid URL {instances_url}: {e}")))?;
        self.get_json(url).await
    }

    async fn healthcheck(&self, base_url: &str) -> Result<(), CatalogError> {
        let url = endpoint(base_url, "healthcheck")?;
        self.client.get(url).send().await?.error_for_status()?;
        Ok(())
    }
}
