use axum::{
    Json,
    body::Body,
    http::{Response, StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;

use crate::services::media_acquirer::AcquisitionError;
use crate::services::range_server::RangeError;
use crate::services::search::SearchError;
use crate::track::TrackParseError;

/// Errors a handler can return. Only `InvalidRequest` carries its message to
/// the client; everything else is logged and answered generically.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Range not satisfiable for {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(#[from] AcquisitionError),

    #[error("Thumbnail failed: {0}")]
    ThumbnailFailed(AcquisitionError),

    #[error("No catalog provider answered")]
    ProviderUnavailable,

    #[error("{0:?}")]
    Internal(color_eyre::Report),
}

impl From<color_eyre::Report> for ApiError {
    fn from(err: color_eyre::Report) -> Self {
        Self::Internal(err)
    }
}

impl From<TrackParseError> for ApiError {
    fn from(_: TrackParseError) -> Self {
        Self::InvalidRequest("Invalid or missing id or quality parameter".to_string())
    }
}

impl From<RangeError> for ApiError {
    fn from(err: RangeError) -> Self {
        match err {
            RangeError::Unsatisfiable { size } => Self::RangeNotSatisfiable { size },
            io @ RangeError::Io { .. } => Self::Internal(color_eyre::Report::new(io)),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidQuery => {
                Self::InvalidRequest("Invalid or missing query".to_string())
            }
            SearchError::InvalidSelection => {
                Self::InvalidRequest("Invalid or missing query or selectedId".to_string())
            }
            SearchError::ProviderUnavailable => Self::ProviderUnavailable,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response<Body> {
        let message = match self {
            ApiError::InvalidRequest(message) => {
                tracing::info!("Invalid request: {}", message);
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
            }
            ApiError::RangeNotSatisfiable { size } => {
                return (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, format!("bytes */{size}"))],
                    Body::empty(),
                )
                    .into_response();
            }
            ApiError::AcquisitionFailed(e) => {
                tracing::error!("{}", e);
                "Failed to fetch audio"
            }
            ApiError::ThumbnailFailed(e) => {
                tracing::error!("{}", e);
                "Failed to fetch thumbnail"
            }
            ApiError::ProviderUnavailable => {
                tracing::error!("Every catalog request failed");
                "An error occurred while searching"
            }
            ApiError::Internal(e) => {
                tracing::error!("{e:?}");
                "Something went wrong"
            }
        };

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": message })),
        )
            .into_response()
    }
}
