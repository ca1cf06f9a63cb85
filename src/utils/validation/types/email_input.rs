//! Represents a validated email address.
//!
//! The address is trimmed, checked against the HTML5 e-mail format with the
//! validator crate, and lower-cased so uniqueness checks are case-insensitive.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidateEmail;

use crate::utils::validation::MAX_EMAIL_LENGTH;

/// A validated e-mail address. Can only be constructed through
/// [`EmailInput::new`], so any instance is well formed and lower-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailInput {
    // The validated and normalized email address
    email: String,
}

impl EmailInput {
    /// Creates a new `EmailInput` after validating the provided string.
    ///
    /// # Arguments
    /// * `email` - The raw address, as submitted at registration
    ///
    /// # Returns
    /// * `Ok(EmailInput)` if the address is valid
    /// * `Err` with a descriptive message if validation fails
    pub fn new(email: &str) -> Result<Self> {
        let email_trimmed = email.trim();

        // Check for empty input first
        if email_trimmed.is_empty() {
            bail!("Email address cannot be empty");
        }

        // Check maximum reasonable length
        if email_trimmed.len() > MAX_EMAIL_LENGTH {
            bail!(
                "Email address exceeds maximum length of {} characters",
                MAX_EMAIL_LENGTH
            );
        }

        // Validate email format
        if !email_trimmed.validate_email() {
            bail!("Invalid email format");
        }

        // Lower-case so two spellings of one address collide
        Ok(Self {
            email: email_trimmed.to_lowercase(),
        })
    }

    /// Returns a string slice of the validated email address
    pub fn as_str(&self) -> &str {
        &self.email
    }
}

impl fmt::Display for EmailInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.email)
    }
}

impl AsRef<str> for EmailInput {
    fn as_ref(&self) -> &str {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        let valid_emails = vec![
            "user@example.com",
            "user.name@example.com",
            "user+tag@example.com",
            "USER@EXAMPLE.COM",
            "   user@example.com   ",
        ];

        for email in valid_emails {
            let result = EmailInput::new(email);
            assert!(result.is_ok(), "Should accept valid email: {}", email);
        }
    }

    #[test]
    fn test_invalid_emails() {
        let binding = "a".repeat(255);
        let invalid_emails = vec![
            "",
            " ",
            "not-an-email",
            "@example.com",
            "user@",
            "user name@example.com",
            &binding,
        ];

        for email in invalid_emails {
            let result = EmailInput::new(email);
            assert!(result.is_err(), "Should reject invalid email: {}", email);
        }
    }

    #[test]
    fn test_email_normalization() {
        let email = EmailInput::new("   USER@EXAMPLE.COM   ").unwrap();
        assert_eq!(email.as_str(), "user@example.com");
    }
}
