//! Data model

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::utils::password_utils::PWHash;
use crate::utils::validation::{EmailInput, PhoneNumber, Username};

/// Role of a user. A user holds a set of roles, in practice exactly one.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display,
)]
pub enum Role {
    Patient,
    Doctor,
}

/// A unique user identifier.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Display,
)]
#[serde(transparent)]
pub struct UserID(Uuid);

impl UserID {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserID {
    fn default() -> Self {
        Self::new()
    }
}

// Domain records use sequential primary keys handed out by the store.
macro_rules! record_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(
                Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Display,
            )]
            #[serde(transparent)]
            pub struct $name(pub u64);
        )*
    };
}

record_id!(
    PatientID,
    DoctorID,
    SpecializationID,
    AllergyID,
    MedicalConditionID,
    EmergencyContactID,
    AppointmentID,
    PrescriptionID,
    MessageID,
    FeedbackID,
);

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
pub enum BloodType {
    #[serde(rename = "A+")]
    #[strum(serialize = "A+")]
    APositive,
    #[serde(rename = "A-")]
    #[strum(serialize = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    #[strum(serialize = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    #[strum(serialize = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    #[strum(serialize = "AB+")]
    ABPositive,
    #[serde(rename = "AB-")]
    #[strum(serialize = "AB-")]
    ABNegative,
    #[serde(rename = "O+")]
    #[strum(serialize = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    #[strum(serialize = "O-")]
    ONegative,
}

/// Appointment lifecycle status
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

/// An account in the identity store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserID,
    pub username: Username,
    pub email: EmailInput,
    pub full_name: Option<String>,
    pub password: PWHash,
    pub roles: BTreeSet<Role>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Name used to greet the user, the full name when known.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .unwrap_or_else(|| self.username.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialization {
    pub id: SpecializationID,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allergy {
    pub id: AllergyID,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalCondition {
    pub id: MedicalConditionID,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: EmergencyContactID,
    pub name: String,
    pub relationship: String,
    pub phone_number: PhoneNumber,
}

/// Patient profile, one-to-one with a [`User`] holding [`Role::Patient`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientID,
    pub user: UserID,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: String,
    pub contact_number: PhoneNumber,
    pub blood_type: Option<BloodType>,
    pub allergies: BTreeSet<AllergyID>,
    pub medical_conditions: BTreeSet<MedicalConditionID>,
    pub emergency_contact: Option<EmergencyContactID>,
}

/// Doctor profile, one-to-one with a [`User`] holding [`Role::Doctor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: DoctorID,
    pub user: UserID,
    pub specialty: SpecializationID,
    pub license_number: String,
    pub bio: Option<String>,
    pub is_available: bool,
    pub contact_number: PhoneNumber,
}

/// A booked slot between one patient and one doctor.
///
/// `(doctor, date, time)` and `(patient, date, time)` are both unique
/// across the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentID,
    pub patient: PatientID,
    pub doctor: DoctorID,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason_for_visit: String,
    pub additional_notes: Option<String>,
    pub is_completed: bool,
    pub prescription: Option<PrescriptionID>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionID,
    pub patient: PatientID,
    pub doctor: DoctorID,
    pub medication: String,
    pub dosage: String,
    pub quantity: u32,
    pub refill_instructions: Option<String>,
    pub expiration_date: NaiveDate,
    pub date_prescribed: NaiveDate,
    pub is_active: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageID,
    pub sender: UserID,
    pub recipient: UserID,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub is_archived: bool,
    pub thread: Option<MessageID>,
}

impl Message {
    pub fn involves(&self, user: UserID) -> bool {
        self.sender == user || self.recipient == user
    }
}

/// A patient's rating of one appointment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: FeedbackID,
    pub appointment: AppointmentID,
    pub patient: PatientID,
    pub doctor: DoctorID,
    pub rating: u8,
    pub comments: Option<String>,
}
