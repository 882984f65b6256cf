//! Client-side request validation
//!
//! Payloads are checked before any network call. Failures are reported per
//! field so a form can render them inline next to the offending input.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum accepted comment length, in characters
pub const MAX_COMMENT_LEN: usize = 2000;

/// Per-field validation failures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed for: {}", self.field_names().join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    /// Create empty error set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Messages recorded for a field
    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }

    /// Names of every field with at least one message
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Whether no failures were recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub(crate) fn require_text(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "is required");
        }
    }

    pub(crate) fn require_email(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "is required");
        } else if !EMAIL.is_match(value.trim()) {
            self.add(field, "must be a valid email address");
        }
    }

    pub(crate) fn require_password(&mut self, field: &str, value: &str) {
        if value.chars().count() < MIN_PASSWORD_LEN {
            self.add(
                field,
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }
    }

    pub(crate) fn require_non_negative(&mut self, field: &str, value: Option<f64>) {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                self.add(field, "must be a non-negative number");
            }
        }
    }
}

/// Implemented by every request payload sent to the API
pub trait Validate {
    /// Check the payload, collecting every failure
    fn validate(&self) -> Result<(), ValidationErrors>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn messages_accumulate_per_field() {
        let mut errors = ValidationErrors::new();
        errors.require_text("name", "   ");
        errors.require_email("email", "not-an-email");
        errors.require_password("password", "short");

        assert_eq!(errors.field("name"), ["is required"]);
        assert_eq!(errors.field("email"), ["must be a valid email address"]);
        assert_eq!(errors.field_names(), vec!["email", "name", "password"]);
        assert!(errors.to_string().contains("email, name, password"));
    }

    #[test]
    fn email_shape() {
        let mut errors = ValidationErrors::new();
        errors.require_email("email", "farmer@example.com");
        assert!(errors.is_empty());
    }

    #[test]
    fn negative_amounts_rejected() {
        let mut errors = ValidationErrors::new();
        errors.require_non_negative("acreage", Some(-1.0));
        errors.require_non_negative("revenue", None);
        errors.require_non_negative("debt", Some(f64::NAN));
        assert_eq!(errors.field_names(), vec!["acreage", "debt"]);
    }
}
