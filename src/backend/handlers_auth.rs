//! Routes requiring a session. Role checks happen in the services.

use std::{collections::HashMap, str::FromStr, sync::Arc};

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Json, Path, Query,
    },
    http::StatusCode,
    Extension,
};
use log::error;
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::backend::error::ApiError;
use crate::backend::middlewares::{run_blocking, JsonBody, SessionUser};
use crate::backend::models::{StatusUpdate, StatusUpdated};
use crate::consts::SESSION_USER_KEY;
use crate::models::{Appointment, AppointmentID, Feedback, Message, MessageID, Prescription, Role};
use crate::services::{
    AppointmentFilter, BookingRequest, Mailbox, MessageFlags, NewFeedback, NewMessage,
    NewPrescription, Service, ServiceError,
};
use crate::utils::error_messages::APPOINTMENT_NOT_FOUND;

type Created<T> = (StatusCode, Json<T>);

type QueryParams = Result<Query<HashMap<String, String>>, QueryRejection>;

pub async fn logout(SessionUser(caller): SessionUser, session: Session) -> Result<Json<Value>, ApiError> {
    session.insert(SESSION_USER_KEY, Value::Null).map_err(|e| {
        error!("Failed to close session for {}: {}", caller.username, e);
        ApiError::Service(ServiceError::Storage("Session store unavailable".to_string()))
    })?;
    Ok(Json(json!({ "message": "Logged out" })))
}

// ----------------------------------------------------------- appointments

pub async fn patient_appointments(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    params: QueryParams,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let Query(params) = params?;
    let filter = AppointmentFilter::from_query(&params)?;
    Ok(Json(service.list_appointments(&caller, Role::Patient, &filter)?))
}

pub async fn book_as_patient(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    JsonBody(request): JsonBody<BookingRequest>,
) -> Result<Created<Appointment>, ApiError> {
    let appointment =
        run_blocking(move || service.create_appointment_as_patient(&caller, &request)).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn doctor_appointments(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    params: QueryParams,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let Query(params) = params?;
    let filter = AppointmentFilter::from_query(&params)?;
    Ok(Json(service.list_appointments(&caller, Role::Doctor, &filter)?))
}

pub async fn book_as_doctor(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    JsonBody(request): JsonBody<BookingRequest>,
) -> Result<Created<Appointment>, ApiError> {
    let appointment =
        run_blocking(move || service.create_appointment_as_doctor(&caller, &request)).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn update_status(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    JsonBody(update): JsonBody<StatusUpdate>,
) -> Result<Json<StatusUpdated>, ApiError> {
    // Without an id nothing can match
    let id = update
        .id
        .map(AppointmentID)
        .ok_or_else(|| ServiceError::NotFound(APPOINTMENT_NOT_FOUND.to_string()))?;

    let appointment = run_blocking(move || {
        service.update_appointment_status(&caller, id, update.status.as_deref())
    })
    .await?;
    Ok(Json(StatusUpdated {
        message: "Appointment status updated successfully",
        appointment,
    }))
}

// ---------------------------------------------------------- prescriptions

pub async fn prescriptions(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
) -> Result<Json<Vec<Prescription>>, ApiError> {
    Ok(Json(service.list_prescriptions(&caller)?))
}

pub async fn prescribe(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    JsonBody(request): JsonBody<NewPrescription>,
) -> Result<Created<Prescription>, ApiError> {
    let prescription = run_blocking(move || service.create_prescription(&caller, &request)).await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

// --------------------------------------------------------------- messages

pub async fn messages(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    params: QueryParams,
) -> Result<Json<Vec<Message>>, ApiError> {
    let Query(params) = params?;
    let mailbox = match params.get("box").map(|b| b.trim()).filter(|b| !b.is_empty()) {
        None => Mailbox::default(),
        Some(b) => Mailbox::from_str(b)
            .map_err(|_| ServiceError::Validation("box: expected inbox or sent".to_string()))?,
    };
    let include_archived = params
        .get("include_archived")
        .is_some_and(|v| matches!(v.as_str(), "true" | "1"));

    Ok(Json(service.list_messages(&caller, mailbox, include_archived)?))
}

pub async fn send_message(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    JsonBody(request): JsonBody<NewMessage>,
) -> Result<Created<Message>, ApiError> {
    let message = run_blocking(move || service.send_message(&caller, &request)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn update_message(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    id: Result<Path<u64>, PathRejection>,
    JsonBody(flags): JsonBody<MessageFlags>,
) -> Result<Json<Message>, ApiError> {
    let Path(id) = id?;
    let message = run_blocking(move || service.update_message(&caller, MessageID(id), &flags)).await?;
    Ok(Json(message))
}

// --------------------------------------------------------------- feedback

pub async fn feedback(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
) -> Result<Json<Vec<Feedback>>, ApiError> {
    Ok(Json(service.list_feedback(&caller)?))
}

pub async fn leave_feedback(
    SessionUser(caller): SessionUser,
    Extension(service): Extension<Arc<Service>>,
    JsonBody(request): JsonBody<NewFeedback>,
) -> Result<Created<Feedback>, ApiError> {
    let feedback = run_blocking(move || service.leave_feedback(&caller, &request)).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}
