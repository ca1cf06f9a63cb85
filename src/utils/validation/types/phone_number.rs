use derive_more::derive::Display;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::InvalidInput;

// Optional '+', optional leading 1, then 9 to 15 digits
static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("Failed to compile phone regex"));

/// Wrapper type for a phone number in the `+999999999` format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl TryFrom<&str> for PhoneNumber {
    type Error = InvalidInput;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        if PHONE_REGEX.is_match(value) {
            Ok(PhoneNumber(value.to_string()))
        } else {
            Err(InvalidInput)
        }
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
