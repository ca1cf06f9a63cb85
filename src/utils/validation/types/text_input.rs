//! Provides a validated free-text representation.
//!
//! Text accepted from clients (names, addresses, reasons for visit, messages)
//! goes through this type, which:
//! - trims surrounding whitespace and rejects empty content
//! - enforces a length limit
//! - rejects control characters and HTML
//! - normalizes Unicode to NFKC

use ammonia::is_html;
use anyhow::{bail, Context, Result};
use std::fmt;
use unicode_normalization::UnicodeNormalization;
use validator::ValidateNonControlCharacter;

use crate::utils::validation::{MAX_CONTENT_LENGTH, MAX_SHORT_CONTENT_LENGTH};

/// Text content that passed validation. Can only be built through
/// the constructors below, so any instance is trimmed, bounded and free of
/// markup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextInput {
    // The validated and normalized text content
    text_content: String,
}

impl TextInput {
    /// Long-form content such as visit notes, addresses or message bodies.
    /// Applies the maximum length for long content.
    ///
    /// # Arguments
    /// * `content` - The text to validate
    pub fn new_long_form(content: &str) -> Result<Self> {
        Self::new(content, MAX_CONTENT_LENGTH).context("Failed to create long-form content")
    }

    /// Short-form content such as names, a reason for visit or a
    /// medication. Applies the stricter short-content limit.
    ///
    /// # Arguments
    /// * `content` - The text to validate
    pub fn new_short_form(content: &str) -> Result<Self> {
        Self::new(content, MAX_SHORT_CONTENT_LENGTH).context("Failed to create short-form content")
    }

    /// Content with a caller-chosen limit.
    pub fn new_with_limit(content: &str, max_length: usize) -> Result<Self> {
        Self::new(content, max_length)
            .with_context(|| format!("Failed to create content of at most {max_length} characters"))
    }

    /// Performs the validation shared by every constructor.
    fn new(content: &str, max_length: usize) -> Result<Self> {
        // First, normalize whitespace by trimming
        let trimmed = content.trim();

        // Checks run in order of cost
        if trimmed.is_empty() {
            bail!("Content cannot be empty");
        }

        // Length in characters, not bytes
        if trimmed.chars().count() > max_length {
            bail!("Content exceeds maximum length of {} characters", max_length);
        }

        if !trimmed.validate_non_control_character() {
            bail!("Content contains invalid control characters");
        }

        if is_html(trimmed) {
            bail!("Content cannot contain HTML");
        }

        // Normalize Unicode characters to ensure consistent representation
        let normalized = trimmed.nfkc().collect::<String>();

        Ok(Self {
            text_content: normalized,
        })
    }

    /// Returns the validated text as a string slice
    pub fn as_str(&self) -> &str {
        &self.text_content
    }

    /// Consumes the wrapper, returning the validated text
    pub fn into_inner(self) -> String {
        self.text_content
    }
}

impl fmt::Display for TextInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text_content)
    }
}

impl AsRef<str> for TextInput {
    fn as_ref(&self) -> &str {
        &self.text_content
    }
}
