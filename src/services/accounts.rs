//! Registration and login.
//!
//! A registration creates the account, its profile and the records the
//! profile points to in one transaction: none of them is kept when any
//! step or the save fails.

use std::{collections::BTreeSet, str::FromStr};

use chrono::{Local, NaiveDate};
use log::{info, warn};
use serde::Deserialize;

use super::{invalid, optional_text, parse_date, Service, ServiceError};
use crate::authorization::Principal;
use crate::email::send_in_background;
use crate::models::{
    BloodType, Doctor, DoctorID, EmergencyContact, EmergencyContactID, Gender, Patient, PatientID,
    Role, User, UserID,
};
use crate::utils::password_utils::{self, PWHash};
use crate::utils::validation::{
    EmailInput, PasswordInput, PhoneNumber, TextInput, Username, MAX_BIO_LENGTH,
};

const WELCOME_SUBJECT: &str = "Welcome to Our Health Service";

#[derive(Debug, Clone, Deserialize)]
pub struct EmergencyContactForm {
    pub name: String,
    pub relationship: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub date_of_birth: String,
    pub gender: String,
    pub address: String,
    pub contact_number: String,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContactForm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub specialty: String,
    pub license_number: String,
    pub contact_number: String,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Fields every account has, validated and with the password hashed
struct Account {
    username: Username,
    email: EmailInput,
    full_name: Option<String>,
    password: PWHash,
}

impl Account {
    fn validate(
        username: &str,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let username = Username::try_from(username.trim()).map_err(invalid("username"))?;
        let email = EmailInput::new(email).map_err(invalid("email"))?;
        let full_name = optional_text("full_name", full_name, false)?;
        let password = PasswordInput::new(password, username.as_ref()).map_err(invalid("password"))?;

        let password = password_utils::hash(password.as_ref()).map_err(|e| {
            log::error!("Failed to hash password: {e}");
            ServiceError::Storage("Failed to hash password".to_string())
        })?;

        Ok(Self {
            username,
            email,
            full_name,
            password,
        })
    }

    fn into_user(self, role: Role) -> User {
        User {
            id: UserID::new(),
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            password: self.password,
            roles: BTreeSet::from([role]),
        }
    }
}

struct ValidContact {
    name: String,
    relationship: String,
    phone_number: PhoneNumber,
}

fn phone(field: &'static str, value: &str) -> Result<PhoneNumber, ServiceError> {
    PhoneNumber::try_from(value).map_err(|_| {
        ServiceError::Validation(format!(
            "{field}: phone number must be entered in the format '+999999999', up to 15 digits"
        ))
    })
}

fn short(field: &'static str, value: &str) -> Result<String, ServiceError> {
    Ok(TextInput::new_short_form(value)
        .map_err(invalid(field))?
        .into_inner())
}

/// Trims names, dropping blanks and case-insensitive duplicates.
fn names(field: &'static str, values: &[String]) -> Result<Vec<String>, ServiceError> {
    let mut kept: Vec<String> = Vec::new();
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        let name = short(field, value)?;
        if !kept.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
            kept.push(name);
        }
    }
    Ok(kept)
}

fn date_of_birth(value: &str) -> Result<NaiveDate, ServiceError> {
    let date = parse_date("date_of_birth", value)?;
    if date > Local::now().date_naive() {
        return Err(ServiceError::Validation(
            "date_of_birth: can not be in the future".to_string(),
        ));
    }
    Ok(date)
}

impl Service {
    /// Creates a patient account and profile, then sends the welcome e-mail.
    pub fn register_patient(&self, form: &PatientRegistration) -> Result<Principal, ServiceError> {
        let date_of_birth = date_of_birth(&form.date_of_birth)?;
        let gender = Gender::from_str(form.gender.trim()).map_err(|_| {
            ServiceError::Validation("gender: expected one of male, female, other".to_string())
        })?;
        let address = TextInput::new_long_form(&form.address)
            .map_err(invalid("address"))?
            .into_inner();
        let contact_number = phone("contact_number", &form.contact_number)?;
        let blood_type = match form.blood_type.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            None => None,
            Some(b) => Some(BloodType::from_str(b).map_err(|_| {
                ServiceError::Validation(format!("blood_type: {b} is not a valid blood type"))
            })?),
        };
        let allergies = names("allergies", &form.allergies)?;
        let conditions = names("medical_conditions", &form.medical_conditions)?;
        let contact = form
            .emergency_contact
            .as_ref()
            .map(|c| {
                Ok::<_, ServiceError>(ValidContact {
                    name: short("emergency_contact.name", &c.name)?,
                    relationship: short("emergency_contact.relationship", &c.relationship)?,
                    phone_number: phone("emergency_contact.phone_number", &c.phone_number)?,
                })
            })
            .transpose()?;

        let account = Account::validate(
            &form.username,
            &form.email,
            &form.password,
            form.full_name.as_deref(),
        )?;
        let user = account.into_user(Role::Patient);
        let principal = Principal::from(&user);
        let greeting = user.display_name().to_string();
        let email = user.email.to_string();

        self.transaction(|db| {
            db.store_user(user)?;

            let allergies = allergies
                .iter()
                .map(|name| db.find_or_create_allergy(name))
                .collect();
            let medical_conditions = conditions
                .iter()
                .map(|name| db.find_or_create_condition(name))
                .collect();
            let emergency_contact = contact.map(|c| {
                let id = EmergencyContactID(db.next_pk());
                db.insert_emergency_contact(EmergencyContact {
                    id,
                    name: c.name,
                    relationship: c.relationship,
                    phone_number: c.phone_number,
                });
                id
            });

            let patient = Patient {
                id: PatientID(db.next_pk()),
                user: principal.user_id,
                date_of_birth,
                gender,
                address,
                contact_number,
                blood_type,
                allergies,
                medical_conditions,
                emergency_contact,
            };
            Ok(db.insert_patient(patient)?)
        })?;

        info!("Registered patient {}", principal.username);
        send_in_background(
            self.mailer.clone(),
            email,
            WELCOME_SUBJECT.to_string(),
            format!(
                "Hello {greeting},\n\nThank you for registering as a patient. We are here to take care of your health."
            ),
        );
        Ok(principal)
    }

    /// Creates a doctor account and profile, then sends the welcome e-mail.
    pub fn register_doctor(&self, form: &DoctorRegistration) -> Result<Principal, ServiceError> {
        let specialty = short("specialty", &form.specialty)?;
        let license_number = short("license_number", &form.license_number)?;
        let contact_number = phone("contact_number", &form.contact_number)?;
        let bio = match form.bio.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            None => None,
            Some(b) => Some(
                TextInput::new_with_limit(b, MAX_BIO_LENGTH)
                    .map_err(invalid("bio"))?
                    .into_inner(),
            ),
        };

        let account = Account::validate(
            &form.username,
            &form.email,
            &form.password,
            form.full_name.as_deref(),
        )?;
        let user = account.into_user(Role::Doctor);
        let principal = Principal::from(&user);
        let greeting = user.display_name().to_string();
        let email = user.email.to_string();

        self.transaction(|db| {
            db.check_doctor_unique(&license_number, contact_number.as_ref())?;
            db.store_user(user)?;

            let specialty = db.find_or_create_specialization(&specialty);
            let doctor = Doctor {
                id: DoctorID(db.next_pk()),
                user: principal.user_id,
                specialty,
                license_number,
                bio,
                is_available: true,
                contact_number,
            };
            Ok(db.insert_doctor(doctor)?)
        })?;

        info!("Registered doctor {}", principal.username);
        send_in_background(
            self.mailer.clone(),
            email,
            WELCOME_SUBJECT.to_string(),
            format!(
                "Hello Dr. {greeting},\n\nThank you for registering as a doctor. We are excited to have you on board."
            ),
        );
        Ok(principal)
    }

    /// Checks the password, then that the account holds the `role` of the
    /// login endpoint used.
    pub fn login(&self, username: &str, password: &str, role: Role) -> Result<Principal, ServiceError> {
        let user = {
            let db = self.read()?;
            db.lookup_username(username.trim()).cloned()
        };

        let verified = password_utils::verify(password, user.as_ref().map(|u| &u.password));
        match user {
            Some(user) if verified && user.has_role(role) => {
                info!("{} logged in as {}", user.username, role);
                Ok(Principal::from(&user))
            }
            _ => {
                warn!("Failed {} login for {}", role, username);
                Err(ServiceError::InvalidCredentials(role.to_string().to_lowercase()))
            }
        }
    }
}
