use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, header},
    response::Response,
};

use crate::http_server::error::ApiError;
use crate::http_server::http_routes::TrackQuery;
use crate::http_server::state::AppState;
use crate::services::range_server;

pub async fn stream(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<TrackQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let key = params.track_key()?;
    let path = app_state.library.get(key.clone()).await?;

    let response = range_server::serve(
        &path,
        headers.get(header::RANGE),
        key.tier.format().mime_type(),
        app_state.chunk_size,
    )
    .await?;
    Ok(response)
}
