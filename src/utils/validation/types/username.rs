use derive_more::derive::Display;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::InvalidInput;

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]{2,19}$").expect("Failed to compile username regex")
});

/// Wrapper type for a username that has been validated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[serde(transparent)]
pub struct Username(String);

impl TryFrom<String> for Username {
    type Error = InvalidInput;

    fn try_from(username: String) -> Result<Self, Self::Error> {
        username_validation(&username)?;
        Ok(Self(username))
    }
}

impl TryFrom<&str> for Username {
    type Error = InvalidInput;

    fn try_from(username: &str) -> Result<Self, Self::Error> {
        username_validation(username)?;
        Ok(Self(username.to_owned()))
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn username_validation(username: &str) -> Result<(), InvalidInput> {
    if USERNAME_REGEX.is_match(username) {
        Ok(())
    } else {
        Err(InvalidInput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_username() {
        let valid_cases = vec!["alice123", "Bob_user", "developer123", "john_doe_42"];

        for username in valid_cases {
            assert!(
                Username::try_from(username).is_ok(),
                "Valid username {} was rejected !",
                username
            );
        }
    }

    #[test]
    fn test_invalid_username() {
        let invalid_cases = vec![
            "a",
            "123starts_with_numbers",
            "_starts_with_underscore",
            "very_very_long_username_that_exceeds_limit",
            "special@character",
            "has space",
        ];

        for username in invalid_cases {
            assert!(
                Username::try_from(username).is_err(),
                "Invalid username {} was approved !",
                username
            );
        }
    }

    #[test]
    fn test_username_display() {
        let username = Username::try_from("test_user").unwrap();
        assert_eq!(username.to_string(), "test_user");
        assert_eq!(username.as_ref(), "test_user");
    }
}
