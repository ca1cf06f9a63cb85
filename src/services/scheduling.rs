//! Appointment booking, listing and status updates.
//!
//! A slot is an exact `(date, time)` pair. Booking checks that neither party
//! already holds the slot, whatever the status of the existing appointment.

use std::{collections::HashMap, str::FromStr};

use chrono::{NaiveDate, NaiveTime};
use log::{info, warn};
use serde::Deserialize;

use super::{
    doctor_profile, invalid, optional_text, parse_date, parse_time, patient_profile,
    Service, ServiceError,
};
use crate::authorization::{require_role, Principal};
use crate::db::Database;
use crate::models::{Appointment, AppointmentID, AppointmentStatus, DoctorID, PatientID, Role};
use crate::utils::error_messages::{
    APPOINTMENT_NOT_FOUND, DOCTOR_SLOT_TAKEN, OWN_SLOT_TAKEN, PATIENT_SLOT_TAKEN, STATUS_REQUIRED,
};
use crate::utils::validation::TextInput;

/// Booking payload. A patient names the `doctor`, a doctor names the
/// `patient`.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub doctor: Option<u64>,
    #[serde(default)]
    pub patient: Option<u64>,
    pub date: String,
    pub time: String,
    pub reason_for_visit: String,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

struct Slot {
    date: NaiveDate,
    time: NaiveTime,
    reason_for_visit: String,
    additional_notes: Option<String>,
}

impl BookingRequest {
    fn validate(&self) -> Result<Slot, ServiceError> {
        Ok(Slot {
            date: parse_date("date", &self.date)?,
            time: parse_time("time", &self.time)?,
            reason_for_visit: TextInput::new_short_form(&self.reason_for_visit)
                .map_err(invalid("reason_for_visit"))?
                .into_inner(),
            additional_notes: optional_text("additional_notes", self.additional_notes.as_deref(), true)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Date,
    Time,
}

impl SortKey {
    /// Unknown keys fall back to date ordering.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("time") => SortKey::Time,
            _ => SortKey::Date,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: Option<String>,
    pub sort_by: SortKey,
}

impl AppointmentFilter {
    /// Reads `date_from`, `date_to`, `status` and `sort_by` from query
    /// parameters. Empty values are ignored.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ServiceError> {
        let param = |key: &str| params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        Ok(Self {
            date_from: param("date_from").map(|v| parse_date("date_from", v)).transpose()?,
            date_to: param("date_to").map(|v| parse_date("date_to", v)).transpose()?,
            status: param("status").map(str::to_string),
            sort_by: SortKey::parse(param("sort_by")),
        })
    }

    fn matches(&self, appointment: &Appointment) -> bool {
        self.date_from.map_or(true, |from| appointment.date >= from)
            && self.date_to.map_or(true, |to| appointment.date <= to)
            && self
                .status
                .as_deref()
                .map_or(true, |status| appointment.status.as_ref() == status)
    }

    fn apply<'a>(&self, appointments: impl Iterator<Item = &'a Appointment>) -> Vec<Appointment> {
        let mut selected: Vec<Appointment> = appointments
            .filter(|a| self.matches(a))
            .cloned()
            .collect();
        match self.sort_by {
            SortKey::Date => selected.sort_by_key(|a| (a.date, a.time)),
            SortKey::Time => selected.sort_by_key(|a| (a.time, a.date)),
        }
        selected
    }
}

impl Service {
    /// Lists the appointments in which the caller is the `side` party.
    pub fn list_appointments(
        &self,
        caller: &Principal,
        side: Role,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, ServiceError> {
        require_role(caller, side)?;
        let db = self.read()?;

        let appointments = match side {
            Role::Patient => {
                let patient = patient_profile(&db, caller)?.id;
                filter.apply(db.list_appointments().filter(|a| a.patient == patient))
            }
            Role::Doctor => {
                let doctor = doctor_profile(&db, caller)?.id;
                filter.apply(db.list_appointments().filter(|a| a.doctor == doctor))
            }
        };
        Ok(appointments)
    }

    /// Books the caller (a patient) with the doctor named in the request.
    pub fn create_appointment_as_patient(
        &self,
        caller: &Principal,
        request: &BookingRequest,
    ) -> Result<Appointment, ServiceError> {
        require_role(caller, Role::Patient)?;
        let doctor = request
            .doctor
            .map(DoctorID)
            .ok_or_else(|| ServiceError::Validation("doctor: field is required".to_string()))?;
        let slot = request.validate()?;

        let appointment = self.transaction(|db| {
            let patient = patient_profile(db, caller)?.id;
            if db.get_doctor(doctor).is_none() {
                return Err(ServiceError::NotFound(format!("Doctor {doctor} not found")));
            }
            book(db, patient, doctor, slot, DOCTOR_SLOT_TAKEN, OWN_SLOT_TAKEN)
        })?;
        info!(
            "{} booked appointment {} with doctor {} on {} at {}",
            caller.username, appointment.id, doctor, appointment.date, appointment.time
        );
        Ok(appointment)
    }

    /// Books the patient named in the request with the caller (a doctor).
    pub fn create_appointment_as_doctor(
        &self,
        caller: &Principal,
        request: &BookingRequest,
    ) -> Result<Appointment, ServiceError> {
        require_role(caller, Role::Doctor)?;
        let patient = request
            .patient
            .map(PatientID)
            .ok_or_else(|| ServiceError::Validation("patient: field is required".to_string()))?;
        let slot = request.validate()?;

        let appointment = self.transaction(|db| {
            let doctor = doctor_profile(db, caller)?.id;
            if db.get_patient(patient).is_none() {
                return Err(ServiceError::NotFound(format!("Patient {patient} not found")));
            }
            book(db, patient, doctor, slot, OWN_SLOT_TAKEN, PATIENT_SLOT_TAKEN)
        })?;
        info!(
            "Dr. {} booked appointment {} with patient {} on {} at {}",
            caller.username, appointment.id, patient, appointment.date, appointment.time
        );
        Ok(appointment)
    }

    /// Overwrites the status of one of the caller's appointments.
    pub fn update_appointment_status(
        &self,
        caller: &Principal,
        appointment_id: AppointmentID,
        new_status: Option<&str>,
    ) -> Result<Appointment, ServiceError> {
        require_role(caller, Role::Doctor)?;

        let new_status = new_status
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::Validation(STATUS_REQUIRED.to_string()));

        let updated = self.transaction(|db| {
            let doctor = doctor_profile(db, caller)?.id;
            let appointment = db
                .get_appointment_mut(appointment_id)
                .filter(|a| a.doctor == doctor)
                .ok_or_else(|| ServiceError::NotFound(APPOINTMENT_NOT_FOUND.to_string()))?;

            // An unknown appointment is reported before a bad status
            let new_status = new_status?;
            appointment.status = AppointmentStatus::from_str(new_status).map_err(|_| {
                ServiceError::Validation(format!(
                    "status: expected one of pending, confirmed, cancelled, got {new_status}"
                ))
            })?;
            Ok(appointment.clone())
        })?;

        info!(
            "Dr. {} set appointment {} to {}",
            caller.username,
            updated.id,
            updated.status.as_ref()
        );
        Ok(updated)
    }
}

/// Checks both parties' calendars and inserts the appointment into the
/// staged store.
fn book(
    db: &mut Database,
    patient: PatientID,
    doctor: DoctorID,
    slot: Slot,
    doctor_taken: &str,
    patient_taken: &str,
) -> Result<Appointment, ServiceError> {
    if db.doctor_slot_taken(doctor, slot.date, slot.time) {
        warn!("Doctor {} already booked on {} at {}", doctor, slot.date, slot.time);
        return Err(ServiceError::Conflict(doctor_taken.to_string()));
    }
    if db.patient_slot_taken(patient, slot.date, slot.time) {
        warn!("Patient {} already booked on {} at {}", patient, slot.date, slot.time);
        return Err(ServiceError::Conflict(patient_taken.to_string()));
    }

    let appointment = Appointment {
        id: AppointmentID(db.next_pk()),
        patient,
        doctor,
        date: slot.date,
        time: slot.time,
        status: AppointmentStatus::Pending,
        reason_for_visit: slot.reason_for_visit,
        additional_notes: slot.additional_notes,
        is_completed: false,
        prescription: None,
    };
    db.insert_appointment(appointment.clone())?;
    Ok(appointment)
}
