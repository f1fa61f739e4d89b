//! Field-level request validation that reports every problem at once.

use serde_json::json;

use crate::error::ServiceError;

#[derive(Debug, Default)]
pub struct FieldErrors {
    details: Vec<serde_json::Value>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a required, non-blank field. Records an error and returns an
    /// empty string when it is missing.
    pub fn required(&mut self, field: &str, value: Option<String>) -> String {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => v,
            _ => {
                self.push(field, "required");
                String::new()
            }
        }
    }

    /// Record `error` against `field` unless `ok` holds.
    pub fn ensure(&mut self, ok: bool, field: &str, error: &str) {
        if !ok {
            self.push(field, error);
        }
    }

    pub fn push(&mut self, field: &str, error: &str) {
        self.details.push(json!({ "field": field, "error": error }));
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    /// The collected details, if any were recorded.
    pub fn check(self) -> Result<(), Vec<serde_json::Value>> {
        if self.details.is_empty() {
            Ok(())
        } else {
            Err(self.details)
        }
    }

    pub fn finish(self, message: &str) -> Result<(), ServiceError> {
        self.check().map_err(|details| ServiceError::Validation {
            details,
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_missing_field() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.required("name", Some("  Dune ".into())), "Dune");
        errors.required("photo", Some("   ".into()));
        errors.required("owner", None);

        match errors.finish("invalid book") {
            Err(ServiceError::Validation { details, .. }) => {
                assert_eq!(details.len(), 2);
                assert_eq!(details[0]["field"], "photo");
                assert_eq!(details[1]["error"], "required");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn clean_input_passes() {
        let mut errors = FieldErrors::new();
        errors.ensure(true, "email", "invalid");
        assert!(errors.is_empty());
        assert!(errors.finish("unused").is_ok());
    }
}
