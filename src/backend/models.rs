//! Request and response bodies specific to the HTTP API.

use serde::{Deserialize, Serialize};

use crate::models::Appointment;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body of `PATCH /appointments/manage`
#[derive(Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct StatusUpdated {
    pub message: &'static str,
    pub appointment: Appointment,
}
