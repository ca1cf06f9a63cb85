//! Password strength checks applied at registration.

use anyhow::{bail, Result};
use zxcvbn::{zxcvbn, Score};

use crate::utils::validation::{MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};

static MIN_SCORE: Score = Score::Three;

/// A cleartext password that is strong enough to be hashed and stored.
pub struct PasswordInput(String);

impl PasswordInput {
    /// Validates `password` for the account `username`: it must differ from
    /// the username, have 8 to 64 characters and reach a zxcvbn score of 3.
    pub fn new(password: &str, username: &str) -> Result<Self> {
        if password.eq_ignore_ascii_case(username) {
            bail!("Password must be different from the username");
        }

        let length = password.chars().count();
        if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
            bail!(
                "Password must be between {} and {} characters long",
                MIN_PASSWORD_LENGTH,
                MAX_PASSWORD_LENGTH
            );
        }

        let estimate = zxcvbn(password, &[username]);
        if estimate.score() < MIN_SCORE {
            match estimate.feedback().and_then(|feedback| feedback.warning()) {
                Some(warning) => bail!("Password is too weak: {}", warning),
                None => bail!("Password is too weak"),
            }
        }

        Ok(Self(password.to_owned()))
    }
}

impl AsRef<str> for PasswordInput {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
