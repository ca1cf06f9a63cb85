use chrono::{Local, NaiveDate};
use log::{info, warn};
use serde::Deserialize;

use super::{doctor_profile, invalid, optional_text, parse_date, Service, ServiceError};
use crate::authorization::{require_any_role, require_role, Principal};
use crate::models::{AppointmentID, PatientID, Prescription, PrescriptionID, Role};
use crate::utils::error_messages::ALLERGY_CONFLICT;
use crate::utils::validation::TextInput;

#[derive(Debug, Clone, Deserialize)]
pub struct NewPrescription {
    pub patient: u64,
    pub medication: String,
    pub dosage: String,
    pub quantity: i64,
    #[serde(default)]
    pub refill_instructions: Option<String>,
    pub expiration_date: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Appointment the prescription was written at, if any
    #[serde(default)]
    pub appointment: Option<u64>,
}

struct ValidPrescription {
    medication: String,
    dosage: String,
    quantity: u32,
    refill_instructions: Option<String>,
    expiration_date: NaiveDate,
    notes: Option<String>,
}

impl NewPrescription {
    fn validate(&self) -> Result<ValidPrescription, ServiceError> {
        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| ServiceError::Validation("quantity: must be a positive integer".to_string()))?;

        Ok(ValidPrescription {
            medication: TextInput::new_short_form(&self.medication)
                .map_err(invalid("medication"))?
                .into_inner(),
            dosage: TextInput::new_short_form(&self.dosage)
                .map_err(invalid("dosage"))?
                .into_inner(),
            quantity,
            refill_instructions: optional_text(
                "refill_instructions",
                self.refill_instructions.as_deref(),
                false,
            )?,
            expiration_date: parse_date("expiration_date", &self.expiration_date)?,
            notes: optional_text("notes", self.notes.as_deref(), true)?,
        })
    }
}

/// Returns the first allergy term found in `medication`, ignoring case.
///
/// A recorded allergy may list several comma-separated terms. Blank terms
/// never match.
pub fn allergy_conflict<'a>(
    medication: &str,
    allergies: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    let medication = medication.to_lowercase();
    allergies.into_iter().find_map(|allergy| {
        allergy
            .split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .find(|term| medication.contains(&term.to_lowercase()))
    })
}

impl Service {
    /// Issues a prescription, refusing medications the patient is recorded
    /// as allergic to.
    pub fn create_prescription(
        &self,
        caller: &Principal,
        request: &NewPrescription,
    ) -> Result<Prescription, ServiceError> {
        require_role(caller, Role::Doctor)?;
        let valid = request.validate()?;

        let prescription = self.transaction(|db| {
            let doctor = doctor_profile(db, caller)?.id;
            let patient_id = PatientID(request.patient);
            let patient = db
                .get_patient(patient_id)
                .ok_or_else(|| ServiceError::NotFound(format!("Patient {patient_id} not found")))?;

            let appointment = match request.appointment.map(AppointmentID) {
                None => None,
                Some(id) => {
                    db.get_appointment(id)
                        .filter(|a| a.doctor == doctor && a.patient == patient_id)
                        .ok_or_else(|| ServiceError::NotFound(format!("Appointment {id} not found")))?;
                    Some(id)
                }
            };

            if let Some(term) = allergy_conflict(&valid.medication, db.patient_allergies(patient)) {
                warn!(
                    "Dr. {} prescribed {} to patient {} allergic to {}",
                    caller.username, valid.medication, patient_id, term
                );
                return Err(ServiceError::AllergyConflict(ALLERGY_CONFLICT.to_string()));
            }

            let prescription = Prescription {
                id: PrescriptionID(db.next_pk()),
                patient: patient_id,
                doctor,
                medication: valid.medication,
                dosage: valid.dosage,
                quantity: valid.quantity,
                refill_instructions: valid.refill_instructions,
                expiration_date: valid.expiration_date,
                date_prescribed: Local::now().date_naive(),
                is_active: true,
                notes: valid.notes,
            };
            db.insert_prescription(prescription.clone())?;
            if let Some(visit) = appointment.and_then(|id| db.get_appointment_mut(id)) {
                visit.prescription = Some(prescription.id);
            }
            Ok(prescription)
        })?;

        info!(
            "Dr. {} prescribed {} to patient {}",
            caller.username, prescription.medication, prescription.patient
        );
        Ok(prescription)
    }

    /// Patients see their own prescriptions, doctors the ones they issued.
    pub fn list_prescriptions(&self, caller: &Principal) -> Result<Vec<Prescription>, ServiceError> {
        require_any_role(caller, &[Role::Patient, Role::Doctor])?;
        let db = self.read()?;

        let patient = db.patient_for_user(caller.user_id).map(|p| p.id);
        let doctor = db.doctor_for_user(caller.user_id).map(|d| d.id);

        Ok(db
            .list_prescriptions()
            .filter(|p| Some(p.patient) == patient || Some(p.doctor) == doctor)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::AppointmentStatus;
    use crate::services::BookingRequest;

    fn amoxicillin(patient: u64) -> NewPrescription {
        NewPrescription {
            patient,
            medication: "Amoxicillin".to_string(),
            dosage: "500mg".to_string(),
            quantity: 30,
            refill_instructions: None,
            expiration_date: "2025-01-01".to_string(),
            notes: None,
            appointment: None,
        }
    }

    #[test]
    fn test_allergy_conflict_matching() {
        assert_eq!(allergy_conflict("Penicillin V", ["penicillin"]), Some("penicillin"));
        assert_eq!(allergy_conflict("PENICILLIN", ["Penicillin"]), Some("Penicillin"));
        assert_eq!(allergy_conflict("Ibuprofen", ["penicillin"]), None);
        assert_eq!(allergy_conflict("Aspirin", ["latex, aspirin"]), Some("aspirin"));
        assert_eq!(allergy_conflict("Aspirin", [" , "]), None);
        assert_eq!(allergy_conflict("Aspirin", Vec::<&str>::new()), None);
    }

    #[test]
    fn test_allergic_patient_is_refused() {
        let mut ids = None;
        let clinic = clinic_with(|db| {
            let (_, patient_id) = patient(db, "alice", &["penicillin"]);
            let (house, _) = doctor(db, "house");
            ids = Some((patient_id, house));
        });
        let (patient_id, house) = ids.unwrap();

        let mut request = amoxicillin(patient_id.0);
        request.medication = "Penicillin".to_string();
        let refused = clinic.service.create_prescription(&house, &request);
        assert!(
            matches!(refused, Err(ServiceError::AllergyConflict(ref msg)) if msg == ALLERGY_CONFLICT),
            "Penicillin should be refused, got {refused:?}"
        );
        assert!(clinic.service.list_prescriptions(&house).unwrap().is_empty());

        let issued = clinic.service.create_prescription(&house, &amoxicillin(patient_id.0)).unwrap();
        assert!(issued.is_active);
        assert_eq!(issued.date_prescribed, Local::now().date_naive());
        assert_eq!(issued.quantity, 30);
    }

    #[test]
    fn test_prescription_validation() {
        let mut ids = None;
        let clinic = clinic_with(|db| {
            let (_, patient_id) = patient(db, "alice", &[]);
            let (house, _) = doctor(db, "house");
            ids = Some((patient_id, house));
        });
        let (patient_id, house) = ids.unwrap();

        for quantity in [0, -3] {
            let mut request = amoxicillin(patient_id.0);
            request.quantity = quantity;
            assert!(matches!(
                clinic.service.create_prescription(&house, &request),
                Err(ServiceError::Validation(_))
            ));
        }

        let mut empty = amoxicillin(patient_id.0);
        empty.medication = " ".to_string();
        assert!(matches!(
            clinic.service.create_prescription(&house, &empty),
            Err(ServiceError::Validation(_))
        ));

        let mut no_dosage = amoxicillin(patient_id.0);
        no_dosage.dosage = String::new();
        assert!(matches!(
            clinic.service.create_prescription(&house, &no_dosage),
            Err(ServiceError::Validation(_))
        ));

        assert!(matches!(
            clinic.service.create_prescription(&house, &amoxicillin(777)),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_patients_cannot_prescribe() {
        let mut ids = None;
        let clinic = clinic_with(|db| ids = Some(patient(db, "alice", &[])));
        let (alice, alice_id) = ids.unwrap();

        assert!(matches!(
            clinic.service.create_prescription(&alice, &amoxicillin(alice_id.0)),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn test_prescription_linked_to_appointment() {
        let mut ids = None;
        let clinic = clinic_with(|db| {
            let (alice, alice_id) = patient(db, "alice", &[]);
            let (_, bob_id) = patient(db, "bob", &[]);
            let (house, house_id) = doctor(db, "house");
            ids = Some((alice, alice_id, bob_id, house, house_id));
        });
        let (alice, alice_id, bob_id, house, house_id) = ids.unwrap();

        let visit = clinic
            .service
            .create_appointment_as_patient(
                &alice,
                &BookingRequest {
                    doctor: Some(house_id.0),
                    patient: None,
                    date: "2024-03-01".to_string(),
                    time: "10:00".to_string(),
                    reason_for_visit: "Sore throat".to_string(),
                    additional_notes: None,
                },
            )
            .unwrap();
        assert_eq!(visit.status, AppointmentStatus::Pending);

        // The appointment belongs to alice, not bob
        let mut wrong_patient = amoxicillin(bob_id.0);
        wrong_patient.appointment = Some(visit.id.0);
        assert!(matches!(
            clinic.service.create_prescription(&house, &wrong_patient),
            Err(ServiceError::NotFound(_))
        ));

        let mut request = amoxicillin(alice_id.0);
        request.appointment = Some(visit.id.0);
        request.notes = Some("Take with food".to_string());
        let issued = clinic.service.create_prescription(&house, &request).unwrap();
        assert_eq!(issued.notes.as_deref(), Some("Take with food"));

        let listed = clinic
            .service
            .list_appointments(&alice, Role::Patient, &Default::default())
            .unwrap();
        assert_eq!(listed[0].prescription, Some(issued.id));
    }

    #[test]
    fn test_prescriptions_are_listed_per_party() {
        let mut ids = None;
        let clinic = clinic_with(|db| {
            let (alice, alice_id) = patient(db, "alice", &[]);
            let (bob, bob_id) = patient(db, "bob", &[]);
            let (house, _) = doctor(db, "house");
            let (wilson, _) = doctor(db, "wilson");
            ids = Some((alice, alice_id, bob, bob_id, house, wilson));
        });
        let (alice, alice_id, bob, bob_id, house, wilson) = ids.unwrap();

        clinic.service.create_prescription(&house, &amoxicillin(alice_id.0)).unwrap();
        clinic.service.create_prescription(&wilson, &amoxicillin(bob_id.0)).unwrap();
        clinic.service.create_prescription(&house, &amoxicillin(bob_id.0)).unwrap();

        assert_eq!(clinic.service.list_prescriptions(&alice).unwrap().len(), 1);
        assert_eq!(clinic.service.list_prescriptions(&bob).unwrap().len(), 2);
        assert_eq!(clinic.service.list_prescriptions(&house).unwrap().len(), 2);
        assert_eq!(clinic.service.list_prescriptions(&wilson).unwrap().len(), 1);
    }
}
