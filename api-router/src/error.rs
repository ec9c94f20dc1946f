use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Missing source documents: {0}")]
    MissingSource(String),

    #[error("Corrupt index store: {0}")]
    CorruptStore(String),

    #[error("Upstream query failed: {0}")]
    UpstreamQuery(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            Self::InternalError(_) => "internal",
            Self::ValidationError(_) => "validation",
            Self::IndexUnavailable(_) => "index_unavailable",
            Self::MissingSource(_) => "missing_source",
            Self::CorruptStore(_) => "corrupt_store",
            Self::UpstreamQuery(_) => "upstream_query",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::IndexUnavailable(_) | Self::MissingSource(_) | Self::CorruptStore(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::UpstreamQuery(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::IndexUnavailable(cause) => {
                tracing::warn!("Index unavailable: {:?}", cause);
                Self::IndexUnavailable(cause.to_string())
            }
            AppError::MissingSource(msg) => Self::MissingSource(msg),
            AppError::CorruptStore(msg) => Self::CorruptStore(msg),
            AppError::UpstreamQuery(msg) => {
                tracing::error!("Upstream query error: {}", msg);
                Self::UpstreamQuery(msg)
            }
            AppError::Validation(msg) => Self::ValidationError(msg),
            _ => {
                tracing::error!("Internal error: {:?}", err);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind().to_string();
        let message = match self {
            Self::InternalError(message)
            | Self::ValidationError(message)
            | Self::IndexUnavailable(message)
            | Self::MissingSource(message)
            | Self::CorruptStore(message)
            | Self::UpstreamQuery(message) => message,
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                status: "error".to_string(),
                kind,
            }),
        )
            .into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
    kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    // Helper to check status code
    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn test_app_error_to_api_error_conversion() {
        let missing = AppError::MissingSource("no documents".to_string());
        assert!(matches!(
            ApiError::from(missing),
            ApiError::MissingSource(msg) if msg == "no documents"
        ));

        let corrupt = AppError::CorruptStore("bad json".to_string());
        assert!(matches!(ApiError::from(corrupt), ApiError::CorruptStore(_)));

        let unavailable =
            AppError::index_unavailable(AppError::CorruptStore("bad json".to_string()));
        assert!(matches!(
            ApiError::from(unavailable),
            ApiError::IndexUnavailable(msg) if msg.contains("bad json")
        ));

        let upstream = AppError::UpstreamQuery("quota".to_string());
        assert!(matches!(ApiError::from(upstream), ApiError::UpstreamQuery(_)));

        let validation = AppError::Validation("invalid input".to_string());
        assert!(matches!(
            ApiError::from(validation),
            ApiError::ValidationError(msg) if msg == "invalid input"
        ));

        let internal_error = AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "io error"));
        assert!(matches!(
            ApiError::from(internal_error),
            ApiError::InternalError(msg) if msg == "Internal server error"
        ));
    }

    #[test]
    fn test_api_error_response_status_codes() {
        assert_status_code(
            ApiError::InternalError("server error".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        assert_status_code(
            ApiError::ValidationError("invalid input".to_string()),
            StatusCode::BAD_REQUEST,
        );
        assert_status_code(
            ApiError::IndexUnavailable("no index".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
        );
        assert_status_code(
            ApiError::MissingSource("no documents".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
        );
        assert_status_code(
            ApiError::CorruptStore("bad json".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
        );
        assert_status_code(
            ApiError::UpstreamQuery("quota".to_string()),
            StatusCode::BAD_GATEWAY,
        );
    }

    #[test]
    fn test_error_messages() {
        let error = ApiError::ValidationError("prompt is required".to_string());
        assert_eq!(error.to_string(), "Validation error: prompt is required");

        let error = ApiError::UpstreamQuery("timeout".to_string());
        assert_eq!(error.to_string(), "Upstream query failed: timeout");
    }

    #[test]
    fn test_internal_error_sanitization() {
        let api_error = ApiError::InternalError("api key rejected".to_string());
        assert_eq!(api_error.to_string(), "Internal server error");
        assert_status_code(api_error, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
