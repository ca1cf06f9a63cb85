//! Constants used throughout the validation system

/// Maximum length for long-form content (addresses, notes, messages)
pub const MAX_CONTENT_LENGTH: usize = 2_000;
/// Maximum length for short-form content (names, reasons, medication)
pub const MAX_SHORT_CONTENT_LENGTH: usize = 250;
/// Maximum length of a doctor's bio
pub const MAX_BIO_LENGTH: usize = 500;
/// Maximum length of an e-mail address
pub const MAX_EMAIL_LENGTH: usize = 254;
/// Password length bounds, inclusive
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 64;
