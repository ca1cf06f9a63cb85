//! Shared helpers: input validation, password hashing and error messages.

pub mod error_messages;
pub mod password_utils;
pub mod validation;
