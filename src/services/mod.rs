//! Clinic services, and single entry point for access control.
//!
//! Every operation takes the authenticated caller as an explicit
//! [`Principal`], checks its role first, then works on the record store
//! under one lock guard, so a check and the write that depends on it can not
//! interleave with another request. Writes go to a staged copy of the store
//! that replaces it only once saved.

mod accounts;
mod feedback;
mod messaging;
mod prescriptions;
mod scheduling;

pub use accounts::{DoctorRegistration, EmergencyContactForm, PatientRegistration};
pub use feedback::NewFeedback;
pub use messaging::{Mailbox, MessageFlags, NewMessage};
pub use prescriptions::{allergy_conflict, NewPrescription};
pub use scheduling::{AppointmentFilter, BookingRequest, SortKey};

use std::{
    fmt::Display,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{NaiveDate, NaiveTime};
use log::error;
use thiserror::Error;

use crate::authorization::{require_role, AccessDenied, Principal};
use crate::db::{DBError, Database};
use crate::email::Mailer;
use crate::models::{Doctor, Patient, Role, UserID};
use crate::utils::validation::TextInput;

pub struct Service {
    db: RwLock<Database>,
    mailer: Arc<dyn Mailer>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    AllergyConflict(String),

    #[error(transparent)]
    Forbidden(#[from] AccessDenied),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UniqueConstraint(String),

    #[error("Invalid credentials or not a {0}")]
    InvalidCredentials(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl From<DBError> for ServiceError {
    fn from(e: DBError) -> Self {
        match e {
            DBError::UniqueViolation { .. } => ServiceError::UniqueConstraint(e.to_string()),
            DBError::SlotTaken { .. } => ServiceError::Conflict(e.to_string()),
            DBError::MissingReference { .. } | DBError::InvalidUserID(_) => {
                ServiceError::NotFound(e.to_string())
            }
        }
    }
}

/// Maps a validation failure on `field` to [`ServiceError::Validation`].
pub(crate) fn invalid<E: Display>(field: &'static str) -> impl FnOnce(E) -> ServiceError {
    move |e| ServiceError::Validation(format!("{field}: {e:#}"))
}

pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ServiceError::Validation(format!("{field}: expected a date as YYYY-MM-DD")))
}

/// Parses a time of day as `HH:MM`, seconds being accepted but optional.
pub fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, ServiceError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ServiceError::Validation(format!("{field}: expected a time as HH:MM")))
}

/// Validates optional free text, a blank value counting as absent.
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    long_form: bool,
) -> Result<Option<String>, ServiceError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if long_form => Ok(Some(TextInput::new_long_form(v).map_err(invalid(field))?.into_inner())),
        Some(v) => Ok(Some(TextInput::new_short_form(v).map_err(invalid(field))?.into_inner())),
    }
}

impl Service {
    pub fn new(db: Database, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db: RwLock::new(db),
            mailer,
        }
    }

    pub fn save(&self) -> Result<(), ServiceError> {
        commit(&*self.read()?)
    }

    /// Loads the principal for a user id found in a session.
    pub fn principal(&self, user_id: UserID) -> Result<Principal, ServiceError> {
        let db = self.read()?;
        Ok(Principal::from(db.get_user(user_id)?))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Database>, ServiceError> {
        self.db
            .read()
            .or(Err(ServiceError::Storage("DB poisoned".to_string())))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Database>, ServiceError> {
        self.db
            .write()
            .or(Err(ServiceError::Storage("DB poisoned".to_string())))
    }

    /// Applies `change` to a copy of the store, saves the copy, then swaps it
    /// in. On any error the store is left as it was.
    fn transaction<T>(
        &self,
        change: impl FnOnce(&mut Database) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut db = self.write()?;
        let mut staged = db.clone();
        let outcome = change(&mut staged)?;
        commit(&staged)?;
        *db = staged;
        Ok(outcome)
    }
}

/// Writes the store through to disk.
fn commit(db: &Database) -> Result<(), ServiceError> {
    db.save().map_err(|e| {
        error!("Failed to save the database: {e}");
        ServiceError::Storage(e.to_string())
    })
}

fn patient_profile<'db>(db: &'db Database, caller: &Principal) -> Result<&'db Patient, ServiceError> {
    require_role(caller, Role::Patient)?;
    db.patient_for_user(caller.user_id)
        .ok_or_else(|| ServiceError::NotFound("No patient profile for this account".to_string()))
}

fn doctor_profile<'db>(db: &'db Database, caller: &Principal) -> Result<&'db Doctor, ServiceError> {
    require_role(caller, Role::Doctor)?;
    db.doctor_for_user(caller.user_id)
        .ok_or_else(|| ServiceError::NotFound("No doctor profile for this account".to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::test_fixtures;
    use crate::email::Outbox;
    use crate::models::{DoctorID, PatientID};
    use std::path::{Path, PathBuf};

    /// A service over an in-memory store, with the handles tests need.
    pub struct Clinic {
        pub service: Service,
        pub outbox: Arc<Outbox>,
    }

    pub fn clinic_with(setup: impl FnOnce(&mut Database)) -> Clinic {
        clinic_from(Database::default(), setup)
    }

    /// A service saving to `path`, so tests can make the save fail.
    pub fn clinic_at(path: PathBuf, setup: impl FnOnce(&mut Database)) -> Clinic {
        clinic_from(Database::open(path).unwrap(), setup)
    }

    fn clinic_from(mut db: Database, setup: impl FnOnce(&mut Database)) -> Clinic {
        setup(&mut db);
        let outbox = Arc::new(Outbox::in_memory());
        Clinic {
            service: Service::new(db, outbox.clone()),
            outbox,
        }
    }

    pub fn patient(db: &mut Database, username: &str, allergies: &[&str]) -> (Principal, PatientID) {
        let (user, id) = test_fixtures::add_patient(db, username, allergies);
        (Principal::from(db.get_user(user).unwrap()), id)
    }

    pub fn doctor(db: &mut Database, username: &str) -> (Principal, DoctorID) {
        let (user, id) = test_fixtures::add_doctor(db, username);
        (Principal::from(db.get_user(user).unwrap()), id)
    }

    /// Puts a directory where the store file is, so saving fails until
    /// [`unblock_saves`] is called.
    pub fn block_saves(path: &Path) {
        std::fs::remove_file(path).unwrap();
        std::fs::create_dir(path).unwrap();
    }

    pub fn unblock_saves(path: &Path) {
        std::fs::remove_dir(path).unwrap();
    }
}
