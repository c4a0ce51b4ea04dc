//! Translation from internal engine/replication errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

pub enum ApiError {
    NotLeader { leader: Option<u64> },
    NotFound,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotLeader { leader } => {
                let message = match leader {
                    Some(id) => format!("Not Leader. Current Leader: {id}"),
                    None => "Not Leader. Current Leader: unknown".to_string(),
                };
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": message }))
            }
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "key not found" }),
            ),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<kv_engine::EngineError> for ApiError {
    fn from(err: kv_engine::EngineError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
