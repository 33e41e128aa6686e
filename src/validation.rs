//! Validation Support
//!
//! Payload and parameter checks for resource requests. Implement
//! [`Validatable`] on request payloads and call it from the
//! [`ResourceRequest`](crate::ResourceRequest) hook of the matching operation.
//!
//! # Example
//!
//! ```rust,ignore
//! use querycrate::validation::{Validatable, ValidationErrors, validators};
//!
//! #[derive(Debug, serde::Deserialize)]
//! pub struct PostCreate {
//!     pub title: String,
//!     pub views: i64,
//! }
//!
//! impl Validatable for PostCreate {
//!     fn validate(&self) -> Result<(), ValidationErrors> {
//!         let mut errors = ValidationErrors::new();
//!         errors.check(validators::validate_length("title", &self.title, Some(3), Some(120)));
//!         errors.check(validators::validate_range("views", self.views, Some(0), None));
//!         errors.result()
//!     }
//! }
//! ```

use serde::Serialize;
use std::fmt;

use crate::ApiError;

/// Validation error with field name and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the error of a failed check, if any
    pub fn check(&mut self, outcome: Result<(), ValidationError>) {
        if let Err(error) = outcome {
            self.add(error);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// `Ok` when nothing was recorded
    ///
    /// # Errors
    ///
    /// Returns itself when at least one check failed.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::validation_failed(errors.errors.iter().map(ToString::to_string).collect())
    }
}

/// Types that can check their own contents
pub trait Validatable {
    /// # Errors
    ///
    /// Every failed check.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Helper validators for common patterns
pub mod validators {
    use std::fmt;

    use super::ValidationError;
    use crate::params::QueryParams;

    /// Validate string length (in characters) is within range
    ///
    /// # Errors
    ///
    /// When the length is outside `min..=max`.
    pub fn validate_length(
        field: &str,
        value: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<(), ValidationError> {
        let len = value.chars().count();

        if let Some(min_len) = min.filter(|min_len| len < *min_len) {
            return Err(ValidationError::new(
                field,
                format!("Must be at least {min_len} characters"),
            ));
        }

        if let Some(max_len) = max.filter(|max_len| len > *max_len) {
            return Err(ValidationError::new(
                field,
                format!("Must be at most {max_len} characters"),
            ));
        }

        Ok(())
    }

    /// Validate number is within range
    ///
    /// # Errors
    ///
    /// When the value is outside `min..=max`.
    pub fn validate_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
    ) -> Result<(), ValidationError> {
        if let Some(min_val) = min.filter(|min_val| value < *min_val) {
            return Err(ValidationError::new(field, format!("Must be at least {min_val}")));
        }

        if let Some(max_val) = max.filter(|max_val| value > *max_val) {
            return Err(ValidationError::new(field, format!("Must be at most {max_val}")));
        }

        Ok(())
    }

    /// Validate value is not empty
    ///
    /// # Errors
    ///
    /// When the value is blank.
    pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "This field is required"));
        }
        Ok(())
    }

    /// Validate an optional query parameter is a non-negative integer
    ///
    /// # Errors
    ///
    /// When the parameter is present but isn't a plain integer.
    pub fn validate_integer_param(params: &QueryParams, field: &str) -> Result<(), ValidationError> {
        match params.get(field) {
            Some(value) if params.integer(field).is_none() || value.as_scalar().is_none() => {
                Err(ValidationError::new(field, "Must be a non-negative integer"))
            }
            _ => Ok(()),
        }
    }
}
