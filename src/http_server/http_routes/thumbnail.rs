use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use color_eyre::eyre::Context;
use serde::Deserialize;

use crate::http_server::error::ApiError;
use crate::http_server::state::AppState;
use crate::track::TrackId;

#[derive(Debug, Deserialize)]
pub struct ThumbnailQuery {
    id: Option<String>,
}

pub async fn thumbnail(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ThumbnailQuery>,
) -> Result<Response, ApiError> {
    let id = TrackId::parse(params.id.as_deref().unwrap_or_default())
        .map_err(|_| ApiError::InvalidRequest("Invalid or missing id parameter".to_string()))?;

    let path = app_state
        .thumbnails
        .thumbnail(&id)
        .await
        .map_err(ApiError::ThumbnailFailed)?;
    let bytes = tokio::fs::read(&path)
        .await
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;

    Ok(([(header::CONTENT_TYPE, "image/webp")], bytes).into_response())
}
