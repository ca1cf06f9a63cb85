//! Type definitions for the validation system

mod email_input;
mod password_input;
mod phone_number;
mod text_input;
mod username;

pub use email_input::EmailInput;
pub use password_input::PasswordInput;
pub use phone_number::PhoneNumber;
pub use text_input::TextInput;
pub use username::Username;

use derive_more::derive::Display;
use thiserror::Error;

/// Input rejected by one of the `TryFrom` validators
#[derive(Debug, Clone, Copy, Display, Error)]
#[display("Invalid input")]
pub struct InvalidInput;
