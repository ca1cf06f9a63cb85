//! User-facing error messages shared by the API layer

pub const VALIDATION_ERROR: &str = "Validation failed";

pub const AUTH_REQUIRED: &str = "Authentication required";

pub const FORBIDDEN: &str = "You do not have permission to perform this action";

pub const STORAGE_ERROR: &str = "Internal storage error";

pub const INTERNAL_ERROR: &str = "Internal server error";

pub const SESSION_ERROR: &str = "Invalid session";

pub const DOCTOR_SLOT_TAKEN: &str = "Doctor already has an appointment at this time.";

pub const PATIENT_SLOT_TAKEN: &str = "Patient already has an appointment at this time.";

pub const OWN_SLOT_TAKEN: &str = "You already have an appointment at this time.";

pub const ALLERGY_CONFLICT: &str = "Patient is allergic to the prescribed medication.";

pub const STATUS_REQUIRED: &str = "Status is required";

pub const APPOINTMENT_NOT_FOUND: &str = "Appointment not found";
