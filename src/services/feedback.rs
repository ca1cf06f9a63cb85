use log::info;
use serde::Deserialize;

use super::{doctor_profile, optional_text, patient_profile, Service, ServiceError};
use crate::authorization::{require_role, Principal};
use crate::models::{AppointmentID, Feedback, FeedbackID, Role};

const RATINGS: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    pub appointment: u64,
    pub rating: i64,
    #[serde(default)]
    pub comments: Option<String>,
}

impl Service {
    /// Rates one of the caller's appointments. Each appointment takes a
    /// single feedback.
    pub fn leave_feedback(&self, caller: &Principal, request: &NewFeedback) -> Result<Feedback, ServiceError> {
        require_role(caller, Role::Patient)?;
        let rating = u8::try_from(request.rating)
            .ok()
            .filter(|r| RATINGS.contains(r))
            .ok_or_else(|| ServiceError::Validation("rating: must be between 1 and 5".to_string()))?;
        let comments = optional_text("comments", request.comments.as_deref(), true)?;

        let feedback = self.transaction(|db| {
            let patient = patient_profile(db, caller)?.id;
            let appointment_id = AppointmentID(request.appointment);
            let doctor = db
                .get_appointment(appointment_id)
                .filter(|a| a.patient == patient)
                .map(|a| a.doctor)
                .ok_or_else(|| ServiceError::NotFound(format!("Appointment {appointment_id} not found")))?;

            let feedback = Feedback {
                id: FeedbackID(db.next_pk()),
                appointment: appointment_id,
                patient,
                doctor,
                rating,
                comments,
            };
            db.insert_feedback(feedback.clone())?;
            Ok(feedback)
        })?;

        info!(
            "{} rated appointment {} with {}",
            caller.username, feedback.appointment, feedback.rating
        );
        Ok(feedback)
    }

    /// Feedback left about the calling doctor.
    pub fn list_feedback(&self, caller: &Principal) -> Result<Vec<Feedback>, ServiceError> {
        require_role(caller, Role::Doctor)?;
        let db = self.read()?;
        let doctor = doctor_profile(&db, caller)?.id;

        Ok(db
            .list_feedback()
            .filter(|f| f.doctor == doctor)
            .cloned()
            .collect())
    }
}
