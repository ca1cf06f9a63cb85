//! Route table and middleware stack.

use std::sync::Arc;

use axum::error_handling::HandleErrorLayer;
use axum::{
    routing::{get, patch, post},
    BoxError, Extension, Router,
};
use log::warn;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::backend::error::ApiError;
use crate::backend::handlers_auth::{
    book_as_doctor, book_as_patient, doctor_appointments, feedback, leave_feedback, logout,
    messages, patient_appointments, prescribe, prescriptions, send_message, update_message,
    update_status,
};
use crate::backend::handlers_unauth::{doctor_login, patient_login, register_doctor, register_patient};
use crate::services::Service;
use crate::utils::error_messages::SESSION_ERROR;

/// Builds the application router around a shared service.
pub fn get_router(service: Arc<Service>) -> Router {
    let store = MemoryStore::default();
    let session_manager = SessionManagerLayer::new(store).with_http_only(true);

    let sessions = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e: BoxError| async move {
            warn!("Session layer failed: {e}");
            ApiError::BadRequest(SESSION_ERROR.to_string())
        }))
        .layer(session_manager);

    let router = Router::new()
        .merge(unauth_routes())
        .merge(auth_routes())
        .layer(Extension(service))
        .layer(sessions);

    // Any origin is allowed in debug builds only
    if cfg!(debug_assertions) {
        let cors = CorsLayer::new()
            .allow_methods(tower_http::cors::AllowMethods::any())
            .allow_origin(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Routes reachable without a session
fn unauth_routes() -> Router {
    Router::new()
        .route("/patients/register", post(register_patient))
        .route("/doctors/register", post(register_doctor))
        .route("/patients/login", post(patient_login))
        .route("/doctors/login", post(doctor_login))
}

/// Routes whose handlers extract the session user
fn auth_routes() -> Router {
    Router::new()
        .route("/logout", post(logout))
        .route("/appointments", get(patient_appointments).post(book_as_patient))
        .route(
            "/appointments/manage",
            get(doctor_appointments)
                .post(book_as_doctor)
                .patch(update_status),
        )
        .route("/prescriptions", get(prescriptions).post(prescribe))
        .route("/messages", get(messages).post(send_message))
        .route("/messages/:id", patch(update_message))
        .route("/feedback", get(feedback).post(leave_feedback))
}
