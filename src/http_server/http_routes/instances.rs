use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::http_server::state::AppState;
use crate::services::provider_selector::ProviderReport;

pub async fn instances(State(app_state): State<Arc<AppState>>) -> Json<ProviderReport> {
    Json(app_state.selector.report())
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
    /// Hand the refresh to the background task instead of waiting for it.
    #[serde(default)]
    background: bool,
}

pub async fn refresh_instances(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> Response {
    if params.background {
        app_state.provider_refresh.notify_one();
        return (StatusCode::ACCEPTED, Json(app_state.selector.report())).into_response();
    }
    Json(app_state.selector.refresh().await).into_response()
}
