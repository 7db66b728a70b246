use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use color_eyre::eyre::Context;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::{
    cache_store::CacheStore,
    config::Config,
    http_server::{
        http_routes::{download, instances, search, stream, thumbnail},
        state::AppState,
    },
    ports::catalog::CatalogProvider,
    services::{
        audio_library::AudioLibrary,
        media_acquirer::MediaAcquirer,
        piped::PipedClient,
        provider_selector::{ProviderSelector, spawn_provider_refresh_task},
        search::{SearchService, normalize::IdExtractor, store::SearchStore},
        thumbnail::{ThumbnailService, YtimgThumbnailSource},
        ytdlp::YtDlpExtractor,
    },
    track::Tier,
};

async fn root() -> &'static str {
    "Hello, World!"
}

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/download", get(download::download))
        .route("/stream", get(stream::stream))
        .route("/search", get(search::search))
        .route("/search/update-weight", post(search::update_weight))
        .route("/thumbnail", get(thumbnail::thumbnail))
        .route("/instances", get(instances::instances))
        .route("/instances/refresh", post(instances::refresh_instances))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

/// Wires the services for `config` and starts the provider refresh task.
pub async fn build_state(config: &Config) -> color_eyre::Result<Arc<AppState>> {
    let store = CacheStore::new(config.cache_dir_path());
    for tier in Tier::ALL {
        store
            .ensure_directories(tier)
            .await
            .wrap_err("Failed to create cache directories")?;
    }
    store
        .ensure_thumbnail_directory()
        .await
        .wrap_err("Failed to create thumbnail directory")?;

    let acquirer = MediaAcquirer::new(
        store.clone(),
        Arc::new(YtDlpExtractor::new(config.media.ytdlp_path.clone())),
        config.media.source_url_template.clone(),
    );
    let library = Arc::new(AudioLibrary::new(store.clone(), acquirer));

    let catalog: Arc<dyn CatalogProvider> = Arc::new(
        PipedClient::new(config.provider.request_timeout())
            .wrap_err("Failed to create catalog client")?,
    );
    let selector = Arc::new(ProviderSelector::new(catalog.clone(), config.provider.clone()));
    let search = Arc::new(SearchService::new(
        catalog,
        selector.clone(),
        SearchStore::new(store.search_cache_file(), store.search_weights_file()),
        IdExtractor::new(config.search.id_markers.clone()),
    ));

    let thumbnail_client = reqwest::Client::builder()
        .timeout(config.provider.request_timeout())
        .build()
        .wrap_err("Failed to create thumbnail client")?;
    let thumbnails = Arc::new(ThumbnailService::new(
        store,
        Arc::new(YtimgThumbnailSource::new(
            thumbnail_client,
            config.media.ffmpeg_path.clone(),
            config.media.thumbnail_url_template.clone(),
        )),
    ));

    let provider_refresh =
        spawn_provider_refresh_task(selector.clone(), config.provider.refresh_interval());

    Ok(Arc::new(AppState {
        library,
        search,
        selector,
        thumbnails,
        chunk_size: config.stream.chunk_size,
        provider_refresh,
    }))
}

pub async fn start(config: Config) -> color_eyre::Result<()> {
    for tool in [&config.media.ytdlp_path, &config.media.ffmpeg_path] {
        if which::which(tool).is_err() {
            tracing::warn!("{} not found in PATH, requests needing it will fail", tool);
        }
    }

    let app_state = build_state(&config).await?;
    let app = router(app_state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("Failed to bind to {}", address))?;
    tracing::info!(
        "Listening on {} | Cache: {}",
        address,
        config.cache_dir_path().display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Failed to start HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::ports::catalog::{CatalogError, CatalogItem, MockCatalogProvider};
    use crate::ports::thumbnail::{MockThumbnailSource, ThumbnailError};
    use crate::test_utils::GatedExtractor;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const PROVIDER: &str = "https://piped.test";

    struct Harness {
        _dir: TempDir,
        store: CacheStore,
        extractor: Arc<GatedExtractor>,
        router: Router,
    }

    fn harness(catalog: MockCatalogProvider, thumbnails: MockThumbnailSource) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        let extractor = Arc::new(GatedExtractor::new(vec![7u8; 4096]));

        let acquirer = MediaAcquirer::new(
            store.clone(),
            extractor.clone(),
            "https://www.youtube.com/watch?v={id}".to_string(),
        );
        let catalog: Arc<dyn CatalogProvider> = Arc::new(catalog);
        let selector = Arc::new(ProviderSelector::new(
            catalog.clone(),
            ProviderConfig {
                fallback_url: PROVIDER.to_string(),
                ..Default::default()
            },
        ));
        let search = SearchService::new(
            catalog,
            selector.clone(),
            SearchStore::new(store.search_cache_file(), store.search_weights_file()),
            IdExtractor::default(),
        );

        let app_state = Arc::new(AppState {
            library: Arc::new(AudioLibrary::new(store.clone(), acquirer)),
            search: Arc::new(search),
            selector,
            thumbnails: Arc::new(ThumbnailService::new(store.clone(), Arc::new(thumbnails))),
            chunk_size: 500_000,
            provider_refresh: Arc::new(tokio::sync::Notify::new()),
        });

        Harness {
            _dir: dir,
            store,
            extractor,
            router: router(app_state),
        }
    }

    fn default_harness() -> Harness {
        harness(MockCatalogProvider::new(), MockThumbnailSource::new())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn cache_track(store: &CacheStore, id: &str, size: usize) -> Vec<u8> {
        let key = crate::track::TrackKey::new(
            crate::track::TrackId::parse(id).unwrap(),
            Tier::Compressed,
        );
        std::fs::create_dir_all(store.tier_directory(Tier::Compressed)).unwrap();
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        std::fs::write(store.resolve_path(&key), &data).unwrap();
        data
    }

    #[tokio::test]
    async fn test_root() {
        let h = default_harness();
        let response = h.router.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_audio_routes_reject_bad_params() {
        let h = default_harness();
        for uri in [
            "/download?id=abc123",
            "/download?quality=compressed",
            "/stream?id=abc123&quality=hifi",
            "/stream?id=..%2Fsecret&quality=compressed",
        ] {
            let response = h.router.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(
                json_body(response).await,
                json!({"error": "Invalid or missing id or quality parameter"})
            );
        }
        assert_eq!(h.extractor.calls(), 0);
    }

    #[tokio::test]
    async fn test_stream_partial_content() {
        let h = default_harness();
        let data = cache_track(&h.store, "abc123", 1000);

        let request = Request::builder()
            .uri("/stream?id=abc123&quality=compressed")
            .header(header::RANGE, "bytes=0-99")
            .body(Body::empty())
            .unwrap();
        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-99/1000");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), &data[..100]);
        assert_eq!(h.extractor.calls(), 0);
    }

    #[tokio::test]
    async fn test_stream_unsatisfiable_range() {
        let h = default_harness();
        cache_track(&h.store, "abc123", 1000);

        let request = Request::builder()
            .uri("/stream?id=abc123&quality=compressed")
            .header(header::RANGE, "bytes=1000-")
            .body(Body::empty())
            .unwrap();
        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
    }

    #[tokio::test]
    async fn test_concurrent_downloads_share_one_extraction() {
        let h = default_harness();

        let requests: Vec<_> = (0..2)
            .map(|_| {
                let router = h.router.clone();
                tokio::spawn(async move {
                    router
                        .oneshot(get("/download?id=xyz&quality=compressed"))
                        .await
                        .unwrap()
                })
            })
            .collect();

        h.extractor.wait_for_calls(1).await;
        // Give the second request time to attach to the running extraction.
        tokio::time::sleep(Duration::from_millis(200)).await;
        h.extractor.release();

        for request in requests {
            let response = request.await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::CONTENT_DISPOSITION],
                "attachment; filename=\"xyz.mp3\""
            );
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(body.as_ref(), vec![7u8; 4096].as_slice());
        }
        assert_eq!(h.extractor.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_download_is_500_and_leaves_no_entry() {
        let h = default_harness();
        h.extractor.fail_next();
        h.extractor.release();

        let response = h
            .router
            .oneshot(get("/download?id=broken&quality=compressed"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let entries = std::fs::read_dir(h.store.tier_directory(Tier::Compressed))
            .unwrap()
            .count();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn test_search_validation() {
        let h = default_harness();
        for uri in [
            "/search",
            "/search?query=%20%20",
            "/search?query=a&filter=videos",
            "/search?query=a&mode=huge",
        ] {
            let response = h.router.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_search_returns_result_set() {
        let mut catalog = MockCatalogProvider::new();
        catalog
            .expect_search()
            .withf(|base, query, filter| {
                base == PROVIDER && query == "test" && filter == "music_songs"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![CatalogItem {
                    url: Some("/watch?v=abc123".to_string()),
                    title: Some("Test".to_string()),
                    ..Default::default()
                }])
            });
        let h = harness(catalog, MockThumbnailSource::new());

        let response = h
            .router
            .oneshot(get("/search?query=test&filter=songs"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["songs"]["abc123"]["title"], json!("Test"));
        assert_eq!(body["albums"], json!({}));
        assert_eq!(body["playlists"], json!({}));
    }

    #[tokio::test]
    async fn test_search_all_kinds_failing_is_500() {
        let mut catalog = MockCatalogProvider::new();
        catalog
            .expect_search()
            .returning(|_, _, _| Err(CatalogError::Timeout));
        let h = harness(catalog, MockThumbnailSource::new());

        let response = h.router.oneshot(get("/search?query=test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_update_weight_contract() {
        let h = default_harness();

        for expected in 1..=2 {
            let response = h
                .router
                .clone()
                .oneshot(post_json(
                    "/search/update-weight",
                    r#"{"query": "Test", "selectedId": "abc123"}"#,
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                json_body(response).await,
                json!({"success": true, "weight": expected})
            );
        }

        for body in [
            r#"{"query": "test"}"#,
            r#"{"selectedId": "abc123"}"#,
            r#"{"query": "", "selectedId": "abc123"}"#,
            r#"{"query": 5, "selectedId": "abc123"}"#,
            "{not json",
        ] {
            let response = h
                .router
                .clone()
                .oneshot(post_json("/search/update-weight", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn test_thumbnail_route() {
        let mut thumbnails = MockThumbnailSource::new();
        thumbnails.expect_fetch_square().times(1).returning(|_, output| {
            std::fs::write(output, b"RIFFWEBP").unwrap();
            Ok(())
        });
        let h = harness(MockCatalogProvider::new(), thumbnails);

        let response = h
            .router
            .clone()
            .oneshot(get("/thumbnail?id=abc123"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"RIFFWEBP");

        let response = h.router.oneshot(get("/thumbnail")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_500() {
        let mut thumbnails = MockThumbnailSource::new();
        thumbnails
            .expect_fetch_square()
            .returning(|_, _| Err(ThumbnailError::Download("404 Not Found".to_string())));
        let h = harness(MockCatalogProvider::new(), thumbnails);

        let response = h.router.oneshot(get("/thumbnail?id=abc123")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Failed to fetch thumbnail"})
        );
    }

    #[tokio::test]
    async fn test_instances_report() {
        let h = default_harness();
        let response = h.router.oneshot(get("/instances")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"active": PROVIDER, "instances": []})
        );
    }
}
