//! Routes reachable without a session: registration and login.
//! A successful registration or login stores the user in the session.

use std::sync::Arc;

use axum::{extract::Json, http::StatusCode, Extension};
use log::error;
use tower_sessions::Session;

use crate::authorization::Principal;
use crate::backend::error::ApiError;
use crate::backend::middlewares::{run_blocking, JsonBody};
use crate::backend::models::LoginRequest;
use crate::consts::SESSION_USER_KEY;
use crate::models::Role;
use crate::services::{DoctorRegistration, PatientRegistration, Service, ServiceError};

fn open_session(session: &Session, principal: &Principal) -> Result<(), ApiError> {
    session.insert(SESSION_USER_KEY, principal.user_id).map_err(|e| {
        error!("Failed to store session for {}: {}", principal.username, e);
        ApiError::Service(ServiceError::Storage("Session store unavailable".to_string()))
    })
}

pub async fn register_patient(
    Extension(service): Extension<Arc<Service>>,
    session: Session,
    JsonBody(form): JsonBody<PatientRegistration>,
) -> Result<(StatusCode, Json<Principal>), ApiError> {
    let principal = run_blocking(move || service.register_patient(&form)).await?;
    open_session(&session, &principal)?;
    Ok((StatusCode::CREATED, Json(principal)))
}

pub async fn register_doctor(
    Extension(service): Extension<Arc<Service>>,
    session: Session,
    JsonBody(form): JsonBody<DoctorRegistration>,
) -> Result<(StatusCode, Json<Principal>), ApiError> {
    let principal = run_blocking(move || service.register_doctor(&form)).await?;
    open_session(&session, &principal)?;
    Ok((StatusCode::CREATED, Json(principal)))
}

async fn login(
    service: Arc<Service>,
    session: &Session,
    request: LoginRequest,
    role: Role,
) -> Result<Json<Principal>, ApiError> {
    let principal =
        run_blocking(move || service.login(&request.username, &request.password, role)).await?;
    open_session(session, &principal)?;
    Ok(Json(principal))
}

pub async fn patient_login(
    Extension(service): Extension<Arc<Service>>,
    session: Session,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<Principal>, ApiError> {
    login(service, &session, request, Role::Patient).await
}

pub async fn doctor_login(
    Extension(service): Extension<Arc<Service>>,
    session: Session,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<Principal>, ApiError> {
    login(service, &session, request, Role::Doctor).await
}
