use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::instrument;

use crate::config::ProviderConfig;
use crate::ports::catalog::{CatalogError, CatalogProvider, ProviderInstance};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub name: String,
    pub api_url: String,
    /// `None` when the probe failed or timed out.
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderReport {
    pub active: String,
    pub instances: Vec<ProbeResult>,
}

/// Owns the active catalog mirror.
///
/// Searches read the active endpoint on every call; a refresh probes all
/// candidates and swaps it for the fastest one. Only one refresh runs at a
/// time, callers arriving meanwhile get the last report.
pub struct ProviderSelector {
    catalog: Arc<dyn CatalogProvider>,
    settings: ProviderConfig,
    active: RwLock<String>,
    report: RwLock<ProviderReport>,
    refreshing: Mutex<()>,
}

impl ProviderSelector {
    pub fn new(catalog: Arc<dyn CatalogProvider>, settings: ProviderConfig) -> Self {
        let fallback = settings.fallback_url.clone();
        Self {
            catalog,
            active: RwLock::new(fallback.clone()),
            report: RwLock::new(ProviderReport {
                active: fallback,
                instances: Vec::new(),
            }),
            settings,
            refreshing: Mutex::new(()),
        }
    }

    /// The selected endpoint, or the fallback before the first refresh.
    pub fn current(&self) -> String {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn report(&self) -> ProviderReport {
        self.report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self) -> ProviderReport {
        let Ok(_refreshing) = self.refreshing.try_lock() else {
            tracing::debug!("Provider refresh already running");
            return self.report();
        };

        let started = Instant::now();
        let candidates = self.candidates().await;
        let instances = join_all(candidates.into_iter().map(|c| self.probe(c))).await;

        let active = instances
            .iter()
            .filter_map(|probe| probe.latency_ms.map(|latency| (latency, probe)))
            .min_by_key(|(latency, _)| *latency)
            .map(|(_, probe)| probe.api_url.clone())
            .unwrap_or_else(|| {
                tracing::warn!(
                    "No provider instance reachable, using fallback {}",
                    self.settings.fallback_url
                );
                self.settings.fallback_url.clone()
            });

        let report = ProviderReport {
            active: active.clone(),
            instances,
        };
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = active.clone();
        *self.report.write().unwrap_or_else(PoisonError::into_inner) = report.clone();

        tracing::info!(
            "Active provider: {} | Candidates: {} | Duration: {} ms",
            active,
            report.instances.len(),
            started.elapsed().as_millis()
        );
        report
    }

    /// Published instances minus the blocklist and the fallback itself, plus
    /// the configured extras.
    async fn candidates(&self) -> Vec<ProviderInstance> {
        let published = (|| self.catalog.list_instances(&self.settings.instances_url))
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(200))
                    .with_max_times(3),
            )
            .when(|e| !matches!(e, CatalogError::Decode(_)))
            .notify(|e, after| {
                tracing::warn!("Listing provider instances failed: {} (retrying in {:?})", e, after)
            })
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to list provider instances: {}", e);
                Vec::new()
            });

        let fallback_host = host_of(&self.settings.fallback_url);
        let mut candidates: Vec<ProviderInstance> = published
            .into_iter()
            .filter(|instance| !self.settings.blocklist.contains(&instance.name))
            .filter(|instance| {
                fallback_host.is_none() || host_of(&instance.api_url) != fallback_host
            })
            .collect();

        for extra in &self.settings.extra_instances {
            if !candidates.iter().any(|c| c.api_url == extra.api_url) {
                candidates.push(extra.clone());
            }
        }
        candidates
    }

    async fn probe(&self, instance: ProviderInstance) -> ProbeResult {
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.settings.ping_timeout(),
            self.catalog.healthcheck(&instance.api_url),
        )
        .await;

        let latency_ms = match outcome {
            Ok(Ok(())) => Some(started.elapsed().as_millis() as u64),
            Ok(Err(e)) => {
                tracing::debug!("Probe {} failed: {}", instance.api_url, e);
                None
            }
            Err(_) => {
                tracing::debug!("Probe {} timed out", instance.api_url);
                None
            }
        };

        ProbeResult {
            name: instance.name,
            api_url: instance.api_url,
            latency_ms,
        }
    }
}

fn host_of(api_url: &str) -> Option<String> {
    url::Url::parse(api_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}

/// Spawn the provider refresh task. It refreshes once right away, then again
/// whenever the returned handle is notified or the interval elapses.
pub fn spawn_provider_refresh_task(
    selector: Arc<ProviderSelector>,
    interval: Option<Duration>,
) -> Arc<Notify> {
    let notify = Arc::new(Notify::new());
    let notify_clone = notify.clone();

    tokio::spawn(async move {
        tracing::info!("Provider refresh task started");
        loop {
            selector.refresh().await;

            match interval {
                Some(interval) => {
                    tokio::select! {
                        _ = notify_clone.notified() => {
                            tracing::debug!("Provider refresh woken by notification");
                        }
                        _ = tokio::time::sleep(interval) => {
                            tracing::debug!("Provider refresh woken by timer");
                        }
                    }
                }
                None => notify_clone.notified().await,
            }
        }
    });

    notify
}
