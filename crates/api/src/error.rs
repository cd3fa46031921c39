//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ensemble::EnsembleError;
use face_frame::FrameError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unknown session '{0}'")]
    SessionNotFound(String),

    #[error("Processing timed out after {0}ms")]
    Timeout(u64),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EnsembleError> for ApiError {
    fn from(err: EnsembleError) -> Self {
        match err {
            EnsembleError::InvalidInput(reason) => ApiError::BadRequest(reason),
            EnsembleError::Timeout(ms) => ApiError::Timeout(ms),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<FrameError> for ApiError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::InvalidInput(_) | FrameError::Decode(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classifier::ClassifierError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(EnsembleError::InvalidInput("empty".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EnsembleError::Timeout(50)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::from(EnsembleError::Inference {
                model: "m".into(),
                source: ClassifierError::InferenceFailed("x".into()),
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(FrameError::Decode("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::SessionNotFound("s".into()).status(), StatusCode::NOT_FOUND);
    }
}
