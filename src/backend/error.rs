//! HTTP mapping of service errors, as a `{"error": "<message>"}` body.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use serde_json::json;

use crate::services::ServiceError;
use crate::utils::error_messages::{
    AUTH_REQUIRED, FORBIDDEN, INTERNAL_ERROR, STORAGE_ERROR, VALIDATION_ERROR,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{}", AUTH_REQUIRED)]
    Unauthorized,
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("{0}")]
    BadRequest(String),
    /// An extractor refused the request before it reached a handler
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("{}", INTERNAL_ERROR)]
    Internal(String),
}

macro_rules! from_rejection {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    ApiError::Rejected {
                        status: rejection.status(),
                        message: rejection.body_text(),
                    }
                }
            }
        )*
    };
}

from_rejection!(JsonRejection, PathRejection, QueryRejection);

impl ApiError {
    /// A request body that does not have the expected shape
    pub fn malformed(e: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("{VALIDATION_ERROR}: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, AUTH_REQUIRED.to_string()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Rejected { status, message } => {
                warn!("Rejected request: {message}");
                (status, message)
            }
            ApiError::Internal(detail) => {
                error!("Internal failure while serving request: {detail}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR.to_string())
            }
            ApiError::Service(e) => match e {
                ServiceError::Validation(_)
                | ServiceError::Conflict(_)
                | ServiceError::AllergyConflict(_)
                | ServiceError::UniqueConstraint(_)
                | ServiceError::InvalidCredentials(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                ServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, FORBIDDEN.to_string()),
                ServiceError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
                ServiceError::Storage(detail) => {
                    error!("Storage failure while serving request: {detail}");
                    (StatusCode::INTERNAL_SERVER_ERROR, STORAGE_ERROR.to_string())
                }
            },
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::AccessDenied;

    fn status_of(e: impl Into<ApiError>) -> StatusCode {
        let e: ApiError = e.into();
        e.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(ServiceError::Conflict("taken".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::AllergyConflict("allergic".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::InvalidCredentials("patient".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ServiceError::from(AccessDenied)), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(ServiceError::NotFound("gone".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ServiceError::Storage("disk full".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::Internal("task panicked".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_rejections_keep_their_status_and_answer_json() {
        let response = ApiError::Rejected {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            message: "Expected request with `Content-Type: application/json`".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("Content-Type"));
    }
}
