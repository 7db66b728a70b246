use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use axum_extra::{TypedHeader, headers::Range};
use axum_range::{KnownSize, Ranged};
use color_eyre::eyre::Context;
use tokio::fs::File;

use crate::http_server::error::ApiError;
use crate::http_server::http_routes::TrackQuery;
use crate::http_server::state::AppState;

/// Whole file as an attachment; standard range requests are honored.
pub async fn download(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<TrackQuery>,
    range: Option<TypedHeader<Range>>,
) -> Result<Response, ApiError> {
    let key = params.track_key()?;
    let path = app_state.library.get(key.clone()).await?;

    let file = File::open(&path)
        .await
        .wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    let body = KnownSize::file(file)
        .await
        .wrap_err("Failed to get file size")?;

    let range = range.map(|TypedHeader(range)| range);
    let mut response = Ranged::new(range, body).into_response();

    let format = key.tier.format();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.mime_type()));
    let disposition = format!("attachment; filename=\"{}.{}\"", key.id, format.extension());
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    tracing::info!("Serving download: {}", path.display());
    Ok(response)
}
