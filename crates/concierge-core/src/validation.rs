//! Field-level validation results
//!
//! Handlers collect every problem with a submitted form before answering,
//! so a client sees all of its mistakes at once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Validation failures keyed by field name
///
/// Only the first message recorded for a field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless the field already has one
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Record `message` for `field` when `ok` is false
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fold another set of failures into this one
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(field, message);
        }
    }

    /// Failures reported by a `validator` derive; empty on success
    pub fn from_validation(result: Result<(), validator::ValidationErrors>) -> Self {
        result.err().map(Self::from).unwrap_or_default()
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, failures) in errors.field_errors() {
            if let Some(failure) = failures.first() {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| failure.code.to_string());
                fields.add(field.to_string(), message);
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_message_wins() {
        let mut errors = FieldErrors::new();
        errors.check(false, "password", "must be provided");
        errors.check(false, "password", "must be at least 8 bytes long");
        errors.check(true, "email", "must be provided");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("password"), Some("must be provided"));
        assert_eq!(errors.get("email"), None);
    }

    #[test]
    fn test_into_result() {
        assert!(FieldErrors::new().into_result().is_ok());

        let mut errors = FieldErrors::new();
        errors.add("email", "must be a valid email address");
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.to_string(), "email: must be a valid email address");
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut errors = FieldErrors::new();
        errors.add("first_name", "must be provided");
        errors.add("email", "must be provided");

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["first_name"], "must be provided");
        assert_eq!(json["email"], "must be provided");
    }

    #[test]
    fn test_merge_keeps_existing_messages() {
        let mut a = FieldErrors::new();
        a.add("email", "first");
        let mut b = FieldErrors::new();
        b.add("email", "second");
        b.add("phone_number", "must be provided");

        a.merge(b);
        assert_eq!(a.get("email"), Some("first"));
        assert_eq!(a.get("phone_number"), Some("must be provided"));
    }

    #[derive(validator::Validate)]
    struct Contact {
        #[validate(email(message = "must be a valid email address"))]
        email: String,
        #[validate(length(min = 1, message = "must be provided"))]
        phone_number: String,
    }

    #[test]
    fn test_from_validation_uses_derive_messages() {
        use validator::Validate;

        let valid = Contact {
            email: "ops@acme.test".to_string(),
            phone_number: "+15550100".to_string(),
        };
        assert!(FieldErrors::from_validation(valid.validate()).is_valid());

        let invalid = Contact {
            email: "not-an-email".to_string(),
            phone_number: String::new(),
        };
        let errors = FieldErrors::from_validation(invalid.validate());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("email"), Some("must be a valid email address"));
        assert_eq!(errors.get("phone_number"), Some("must be provided"));
    }

    #[test]
    fn test_hand_checks_win_over_merged_derive_messages() {
        use validator::Validate;

        let empty = Contact {
            email: String::new(),
            phone_number: "+15550100".to_string(),
        };
        let mut errors = FieldErrors::new();
        errors.check(!empty.email.is_empty(), "email", "must be provided");
        errors.merge(FieldErrors::from_validation(empty.validate()));

        assert_eq!(errors.get("email"), Some("must be provided"));
    }
}
