//! Request extractors shared by the handlers.
//!
//! [`SessionUser`] resolves the user stored in the session into the
//! [`Principal`] passed to the services, and rejects requests without one.
//! [`JsonBody`] answers malformed bodies with the API's JSON errors.
//! [`run_blocking`] moves service calls off the async executor.

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use log::{error, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_sessions::Session;

use crate::authorization::Principal;
use crate::backend::error::ApiError;
use crate::consts::SESSION_USER_KEY;
use crate::models::UserID;
use crate::services::{Service, ServiceError};

/// The authenticated caller of a request
pub struct SessionUser(pub Principal);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let session = parts.extensions.get::<Session>().ok_or(ApiError::Unauthorized)?;
        let service = parts
            .extensions
            .get::<Arc<Service>>()
            .ok_or(ApiError::Unauthorized)?;

        // A logged out session holds null, which does not parse as a user id
        let user_id = session
            .get::<UserID>(SESSION_USER_KEY)
            .ok()
            .flatten()
            .ok_or(ApiError::Unauthorized)?;

        match service.principal(user_id) {
            Ok(principal) => Ok(SessionUser(principal)),
            Err(e) => {
                warn!("Session refers to an unknown user: {e}");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// A JSON request body of type `T`
pub struct JsonBody<T>(pub T);

#[async_trait::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // Syntax and content type first, then the shape of the payload
        let Json(payload) = Json::<Value>::from_request(req, state).await?;
        serde_json::from_value(payload)
            .map(JsonBody)
            .map_err(ApiError::malformed)
    }
}

/// Runs a service call on the blocking thread pool.
pub async fn run_blocking<T, F>(call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| {
            error!("Service task failed: {e}");
            ApiError::Internal(format!("task join error: {e}"))
        })?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_service_calls_leave_the_executor_thread() {
        let executor = std::thread::current().id();
        let worker = run_blocking(|| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(worker, executor);

        let failed = run_blocking(|| Err::<(), _>(ServiceError::NotFound("gone".to_string()))).await;
        assert!(matches!(failed, Err(ApiError::Service(ServiceError::NotFound(_)))));
    }
}
