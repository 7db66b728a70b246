use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http_server::error::ApiError;
use crate::http_server::state::AppState;
use crate::services::search::{ResultSet, SearchKind, SearchMode};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    query: Option<String>,
    filter: Option<String>,
    mode: Option<String>,
}

pub async fn search(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ResultSet>, ApiError> {
    let query = params.query.unwrap_or_default();
    let kinds = match params.filter.as_deref() {
        None | Some("") => Vec::new(),
        Some(filter) => vec![filter.parse::<SearchKind>().map_err(ApiError::InvalidRequest)?],
    };
    let mode = match params.mode.as_deref() {
        None | Some("") => SearchMode::default(),
        Some(mode) => mode.parse::<SearchMode>().map_err(ApiError::InvalidRequest)?,
    };

    let results = app_state.search.search(&query, &kinds, mode).await?;
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWeightInput {
    query: Option<String>,
    selected_id: Option<String>,
}

pub async fn update_weight(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<UpdateWeightInput>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let invalid = || ApiError::InvalidRequest("Invalid or missing query or selectedId".to_string());

    let Json(input) = payload.map_err(|e| {
        tracing::debug!("Rejected update-weight body: {}", e);
        invalid()
    })?;
    let (Some(query), Some(selected_id)) = (input.query, input.selected_id) else {
        return Err(invalid());
    };
    if query.trim().is_empty() || selected_id.trim().is_empty() {
        return Err(invalid());
    }

    let weight = app_state
        .search
        .record_selection(&query, &selected_id)
        .await?;
    Ok(Json(json!({ "success": true, "weight": weight })))
}
