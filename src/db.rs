//! In-memory record store, saved as JSON.
//!
//! The store owns every uniqueness constraint of the data model. Services
//! check the same constraints beforehand to build friendly error messages,
//! but an insert that would break one is always refused here.

use crate::models::*;
use chrono::{NaiveDate, NaiveTime};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs::{create_dir_all, File},
    io::{self, ErrorKind::NotFound},
    path::PathBuf,
};
use thiserror::Error;

#[derive(Serialize, Deserialize, Default, Clone)]
pub struct Database {
    #[serde(skip)]
    path: Option<PathBuf>,
    next_pk: u64,
    users: HashMap<UserID, User>,
    patients: BTreeMap<PatientID, Patient>,
    doctors: BTreeMap<DoctorID, Doctor>,
    specializations: BTreeMap<SpecializationID, Specialization>,
    allergies: BTreeMap<AllergyID, Allergy>,
    medical_conditions: BTreeMap<MedicalConditionID, MedicalCondition>,
    emergency_contacts: BTreeMap<EmergencyContactID, EmergencyContact>,
    appointments: BTreeMap<AppointmentID, Appointment>,
    prescriptions: BTreeMap<PrescriptionID, Prescription>,
    messages: BTreeMap<MessageID, Message>,
    feedback: BTreeMap<FeedbackID, Feedback>,
}

#[derive(Debug, Error)]
pub enum DBError {
    #[error("Invalid user ID: {0}")]
    InvalidUserID(UserID),
    #[error("{field} already in use: {value}")]
    UniqueViolation { field: &'static str, value: String },
    #[error("{party} already booked on {date} at {time}")]
    SlotTaken {
        party: &'static str,
        date: NaiveDate,
        time: NaiveTime,
    },
    #[error("No {entity} with id {id}")]
    MissingReference { entity: &'static str, id: u64 },
}

fn unique(field: &'static str, value: impl ToString) -> DBError {
    DBError::UniqueViolation {
        field,
        value: value.to_string(),
    }
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self, io::Error> {
        match File::open(&path) {
            Ok(f) => {
                let mut db: Self = serde_json::from_reader(f)?;
                db.path = Some(path);
                Ok(db)
            }

            Err(not_found) if not_found.kind() == NotFound => {
                info!("DB file not found, creating new empty DB");
                let mut new_db = Database::default();
                new_db.path = Some(path);

                // Write right away so a bad path fails at startup
                new_db.save()?;
                Ok(new_db)
            }

            Err(other) => Err(other),
        }
    }

    pub fn save(&self) -> Result<(), io::Error> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    create_dir_all(parent)?;
                }
            }
            let file = File::create(path)?;
            serde_json::to_writer_pretty(file, self)?;
        }
        Ok(())
    }

    pub fn next_pk(&mut self) -> u64 {
        self.next_pk += 1;
        self.next_pk
    }

    // ---------------------------------------------------------------- users

    pub fn get_user(&self, user: UserID) -> Result<&User, DBError> {
        self.users.get(&user).ok_or(DBError::InvalidUserID(user))
    }

    pub fn lookup_username(&self, name: &str) -> Option<&User> {
        self.users.values().find(|user| user.username.as_ref() == name)
    }

    pub fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|user| user.email.as_str() == email)
    }

    pub fn store_user(&mut self, user: User) -> Result<(), DBError> {
        if self.lookup_username(user.username.as_ref()).is_some() {
            return Err(unique("username", &user.username));
        }
        if self.email_taken(user.email.as_str()) {
            return Err(unique("email", &user.email));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    // ------------------------------------------------------------- profiles

    pub fn get_patient(&self, id: PatientID) -> Option<&Patient> {
        self.patients.get(&id)
    }

    pub fn patient_for_user(&self, user: UserID) -> Option<&Patient> {
        self.patients.values().find(|p| p.user == user)
    }

    pub fn insert_patient(&mut self, patient: Patient) -> Result<(), DBError> {
        self.get_user(patient.user)?;
        if self.patient_for_user(patient.user).is_some() {
            return Err(unique("patient user", patient.user));
        }
        self.patients.insert(patient.id, patient);
        Ok(())
    }

    pub fn get_doctor(&self, id: DoctorID) -> Option<&Doctor> {
        self.doctors.get(&id)
    }

    pub fn doctor_for_user(&self, user: UserID) -> Option<&Doctor> {
        self.doctors.values().find(|d| d.user == user)
    }

    /// Checks the unique columns of a doctor profile without inserting.
    pub fn check_doctor_unique(&self, license_number: &str, contact_number: &str) -> Result<(), DBError> {
        if self
            .doctors
            .values()
            .any(|d| d.license_number == license_number)
        {
            return Err(unique("license number", license_number));
        }
        if self
            .doctors
            .values()
            .any(|d| d.contact_number.as_ref() == contact_number)
        {
            return Err(unique("contact number", contact_number));
        }
        Ok(())
    }

    pub fn insert_doctor(&mut self, doctor: Doctor) -> Result<(), DBError> {
        self.get_user(doctor.user)?;
        if self.doctor_for_user(doctor.user).is_some() {
            return Err(unique("doctor user", doctor.user));
        }
        if !self.specializations.contains_key(&doctor.specialty) {
            return Err(DBError::MissingReference {
                entity: "specialization",
                id: doctor.specialty.0,
            });
        }
        self.check_doctor_unique(&doctor.license_number, doctor.contact_number.as_ref())?;
        self.doctors.insert(doctor.id, doctor);
        Ok(())
    }

    // ------------------------------------------------- normalized entities

    /// Returns the specialization with this name (case-insensitive),
    /// creating it when missing.
    pub fn find_or_create_specialization(&mut self, name: &str) -> SpecializationID {
        if let Some(existing) = self
            .specializations
            .values()
            .find(|s| s.name.eq_ignore_ascii_case(name))
        {
            return existing.id;
        }
        let id = SpecializationID(self.next_pk());
        self.specializations.insert(
            id,
            Specialization {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn find_or_create_allergy(&mut self, name: &str) -> AllergyID {
        if let Some(existing) = self
            .allergies
            .values()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            return existing.id;
        }
        let id = AllergyID(self.next_pk());
        self.allergies.insert(
            id,
            Allergy {
                id,
                name: name.to_string(),
                description: None,
            },
        );
        id
    }

    pub fn find_or_create_condition(&mut self, name: &str) -> MedicalConditionID {
        if let Some(existing) = self
            .medical_conditions
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
        {
            return existing.id;
        }
        let id = MedicalConditionID(self.next_pk());
        self.medical_conditions.insert(
            id,
            MedicalCondition {
                id,
                name: name.to_string(),
                description: None,
            },
        );
        id
    }

    pub fn insert_emergency_contact(&mut self, contact: EmergencyContact) {
        self.emergency_contacts.insert(contact.id, contact);
    }

    /// Allergy names on file for a patient
    pub fn patient_allergies<'a>(&'a self, patient: &'a Patient) -> impl Iterator<Item = &'a str> + 'a {
        patient
            .allergies
            .iter()
            .filter_map(|id| self.allergies.get(id))
            .map(|allergy| allergy.name.as_str())
    }

    // --------------------------------------------------------- appointments

    pub fn get_appointment(&self, id: AppointmentID) -> Option<&Appointment> {
        self.appointments.get(&id)
    }

    pub fn get_appointment_mut(&mut self, id: AppointmentID) -> Option<&mut Appointment> {
        self.appointments.get_mut(&id)
    }

    pub fn list_appointments(&self) -> impl Iterator<Item = &Appointment> + '_ {
        self.appointments.values()
    }

    pub fn doctor_slot_taken(&self, doctor: DoctorID, date: NaiveDate, time: NaiveTime) -> bool {
        self.appointments
            .values()
            .any(|a| a.doctor == doctor && a.date == date && a.time == time)
    }

    pub fn patient_slot_taken(&self, patient: PatientID, date: NaiveDate, time: NaiveTime) -> bool {
        self.appointments
            .values()
            .any(|a| a.patient == patient && a.date == date && a.time == time)
    }

    /// Inserts an appointment, refusing it when either party already has an
    /// appointment in the same slot.
    pub fn insert_appointment(&mut self, appointment: Appointment) -> Result<(), DBError> {
        if !self.doctors.contains_key(&appointment.doctor) {
            return Err(DBError::MissingReference {
                entity: "doctor",
                id: appointment.doctor.0,
            });
        }
        if !self.patients.contains_key(&appointment.patient) {
            return Err(DBError::MissingReference {
                entity: "patient",
                id: appointment.patient.0,
            });
        }
        if self.doctor_slot_taken(appointment.doctor, appointment.date, appointment.time) {
            return Err(DBError::SlotTaken {
                party: "doctor",
                date: appointment.date,
                time: appointment.time,
            });
        }
        if self.patient_slot_taken(appointment.patient, appointment.date, appointment.time) {
            return Err(DBError::SlotTaken {
                party: "patient",
                date: appointment.date,
                time: appointment.time,
            });
        }
        self.appointments.insert(appointment.id, appointment);
        Ok(())
    }

    // -------------------------------------------------------- prescriptions

    pub fn insert_prescription(&mut self, prescription: Prescription) -> Result<(), DBError> {
        if !self.patients.contains_key(&prescription.patient) {
            return Err(DBError::MissingReference {
                entity: "patient",
                id: prescription.patient.0,
            });
        }
        self.prescriptions.insert(prescription.id, prescription);
        Ok(())
    }

    pub fn list_prescriptions(&self) -> impl Iterator<Item = &Prescription> + '_ {
        self.prescriptions.values()
    }

    // ------------------------------------------------------------- messages

    pub fn get_message(&self, id: MessageID) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub fn get_message_mut(&mut self, id: MessageID) -> Option<&mut Message> {
        self.messages.get_mut(&id)
    }

    pub fn insert_message(&mut self, message: Message) -> Result<(), DBError> {
        self.get_user(message.sender)?;
        self.get_user(message.recipient)?;
        self.messages.insert(message.id, message);
        Ok(())
    }

    pub fn list_messages(&self) -> impl Iterator<Item = &Message> + '_ {
        self.messages.values()
    }

    // ------------------------------------------------------------- feedback

    pub fn insert_feedback(&mut self, feedback: Feedback) -> Result<(), DBError> {
        if !self.appointments.contains_key(&feedback.appointment) {
            return Err(DBError::MissingReference {
                entity: "appointment",
                id: feedback.appointment.0,
            });
        }
        if self
            .feedback
            .values()
            .any(|f| f.appointment == feedback.appointment)
        {
            return Err(unique("appointment feedback", feedback.appointment));
        }
        self.feedback.insert(feedback.id, feedback);
        Ok(())
    }

    pub fn list_feedback(&self) -> impl Iterator<Item = &Feedback> + '_ {
        self.feedback.values()
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;

    fn slot(day: u32, hour: u32) -> (NaiveDate, NaiveTime) {
        (
            NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        )
    }

    fn appointment(db: &mut Database, patient: PatientID, doctor: DoctorID, day: u32, hour: u32) -> Appointment {
        let (date, time) = slot(day, hour);
        Appointment {
            id: AppointmentID(db.next_pk()),
            patient,
            doctor,
            date,
            time,
            status: AppointmentStatus::Pending,
            reason_for_visit: "Checkup".to_string(),
            additional_notes: None,
            is_completed: false,
            prescription: None,
        }
    }

    #[test]
    fn test_store_refuses_double_booked_doctor() {
        let mut db = Database::default();
        let (_, alice) = add_patient(&mut db, "alice", &[]);
        let (_, bob) = add_patient(&mut db, "bob", &[]);
        let (_, house) = add_doctor(&mut db, "house");

        let first = appointment(&mut db, alice, house, 1, 10);
        db.insert_appointment(first).unwrap();

        let second = appointment(&mut db, bob, house, 1, 10);
        let err = db.insert_appointment(second).unwrap_err();
        assert!(matches!(err, DBError::SlotTaken { party: "doctor", .. }));

        // Another hour is free
        let third = appointment(&mut db, bob, house, 1, 11);
        assert!(db.insert_appointment(third).is_ok());
    }

    #[test]
    fn test_store_refuses_double_booked_patient() {
        let mut db = Database::default();
        let (_, alice) = add_patient(&mut db, "alice", &[]);
        let (_, house) = add_doctor(&mut db, "house");
        let (_, wilson) = add_doctor(&mut db, "wilson");

        let first = appointment(&mut db, alice, house, 1, 10);
        db.insert_appointment(first).unwrap();

        let second = appointment(&mut db, alice, wilson, 1, 10);
        let err = db.insert_appointment(second).unwrap_err();
        assert!(matches!(err, DBError::SlotTaken { party: "patient", .. }));
    }

    #[test]
    fn test_store_refuses_dangling_references() {
        let mut db = Database::default();
        let (_, alice) = add_patient(&mut db, "alice", &[]);

        let orphan = appointment(&mut db, alice, DoctorID(999), 1, 10);
        assert!(matches!(
            db.insert_appointment(orphan),
            Err(DBError::MissingReference { entity: "doctor", id: 999 })
        ));
    }

    #[test]
    fn test_unique_user_columns() {
        let mut db = Database::default();
        add_user(&mut db, "alice", Role::Patient);

        let mut duplicate = db.lookup_username("alice").unwrap().clone();
        duplicate.id = UserID::new();
        assert!(matches!(
            db.store_user(duplicate.clone()),
            Err(DBError::UniqueViolation { field: "username", .. })
        ));

        duplicate.username = crate::utils::validation::Username::try_from("alice2").unwrap();
        assert!(matches!(
            db.store_user(duplicate),
            Err(DBError::UniqueViolation { field: "email", .. })
        ));
    }

    #[test]
    fn test_unique_doctor_columns() {
        let mut db = Database::default();
        let (_, house) = add_doctor(&mut db, "house");
        let license = db.get_doctor(house).unwrap().license_number.clone();
        let contact = db.get_doctor(house).unwrap().contact_number.to_string();

        assert!(db.check_doctor_unique(&license, "+41000000000").is_err());
        assert!(db.check_doctor_unique("LIC-other", &contact).is_err());
        assert!(db.check_doctor_unique("LIC-other", "+41000000000").is_ok());
    }

    #[test]
    fn test_normalized_names_are_reused() {
        let mut db = Database::default();
        let first = db.find_or_create_allergy("Penicillin");
        let second = db.find_or_create_allergy("penicillin");
        assert_eq!(first, second);

        let cardio = db.find_or_create_specialization("Cardiology");
        assert_ne!(cardio, db.find_or_create_specialization("Neurology"));
        assert_eq!(cardio, db.find_or_create_specialization("CARDIOLOGY"));
    }

    #[test]
    fn test_feedback_is_one_per_appointment() {
        let mut db = Database::default();
        let (_, alice) = add_patient(&mut db, "alice", &[]);
        let (_, house) = add_doctor(&mut db, "house");
        let visit = appointment(&mut db, alice, house, 2, 9);
        let visit_id = visit.id;
        db.insert_appointment(visit).unwrap();

        let feedback = |id| Feedback {
            id: FeedbackID(id),
            appointment: visit_id,
            patient: alice,
            doctor: house,
            rating: 4,
            comments: None,
        };
        assert!(db.insert_feedback(feedback(100)).is_ok());
        assert!(matches!(
            db.insert_feedback(feedback(101)),
            Err(DBError::UniqueViolation { .. })
        ));
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clinic.json");

        let mut db = Database::open(path.clone()).unwrap();
        let (_, alice) = add_patient(&mut db, "alice", &["latex"]);
        let (_, house) = add_doctor(&mut db, "house");
        let visit = appointment(&mut db, alice, house, 3, 14);
        db.insert_appointment(visit).unwrap();
        db.save().unwrap();

        let reopened = Database::open(path).unwrap();
        assert!(reopened.lookup_username("alice").is_some());
        assert_eq!(reopened.list_appointments().count(), 1);
        let patient = reopened.get_patient(alice).unwrap();
        assert_eq!(reopened.patient_allergies(patient).collect::<Vec<_>>(), vec!["latex"]);

        // Keys keep counting from where they stopped
        let mut reopened = reopened;
        assert!(reopened.next_pk() > house.0);
    }
}
