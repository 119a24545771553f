use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use languella_engine::EngineError;

/// Everything a handler can fail with, mapped onto HTTP statuses with a
/// JSON `{"error": ...}` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("missing configuration: {0}")]
    Config(&'static str),
    #[error("storage error: {0}")]
    Store(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Engine(EngineError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Engine(EngineError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::Conflict) => StatusCode::CONFLICT,
            ApiError::Engine(EngineError::GenerationUnavailable(_))
            | ApiError::Engine(EngineError::MalformedGenerationResponse(_)) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Config(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::debug!("request failed: {self}");
        }
        // Config details stay out of client-facing bodies.
        let message = match &self {
            ApiError::Config(_) | ApiError::Store(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
