//! Input validation and normalisation.
//!
//! Every externally supplied name, email, or password passes through here
//! before it reaches a store.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use validator::ValidateEmail;

/// Validation error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Offending field.
        field: &'static str,
    },

    /// Input exceeds maximum allowed length.
    #[error("{field} exceeds maximum length ({max} characters, got {actual})")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
        /// Actual input length.
        actual: usize,
    },

    /// Input is shorter than required.
    #[error("{field} is too short (minimum {min} characters)")]
    TooShort {
        /// Offending field.
        field: &'static str,
        /// Minimum allowed length.
        min: usize,
    },

    /// Identifier contains characters outside `[a-z0-9_-]` or starts with a non-letter.
    #[error("{field} '{value}' must start with a lowercase letter and contain only a-z, 0-9, '_' or '-'")]
    InvalidIdentifier {
        /// Offending field.
        field: &'static str,
        /// Rejected value.
        value: String,
    },

    /// Value is not one of the accepted options.
    #[error("invalid {field}: '{value}'")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Rejected value.
        value: String,
    },

    /// Email address failed syntax validation.
    #[error("invalid email address: '{0}'")]
    InvalidEmail(String),

    /// Permission key is not of the form `resource:action`.
    #[error("invalid permission key '{0}', expected 'resource:action'")]
    InvalidPermissionKey(String),

    /// A declared catalog was rejected.
    #[error("catalog rejected ({} issue(s)): {}", .issues.len(), .issues.join("; "))]
    Catalog {
        /// One message per rejected entry.
        issues: Vec<String>,
    },
}

/// Size limits per input type.
pub mod limits {
    /// Maximum resource, action, or role name length.
    pub const MAX_IDENTIFIER_LENGTH: usize = 64;

    /// Maximum description length.
    pub const MAX_DESCRIPTION_LENGTH: usize = 512;

    /// Maximum email length (RFC 5321 path limit).
    pub const MAX_EMAIL_LENGTH: usize = 254;

    /// Minimum password length accepted for new credentials.
    pub const MIN_PASSWORD_LENGTH: usize = 8;

    /// Maximum password length (bounds hashing work).
    pub const MAX_PASSWORD_LENGTH: usize = 1024;
}

/// Validate a catalog identifier (resource, action, or role name).
///
/// Leading and trailing whitespace is dropped; the remainder must start with a
/// lowercase ASCII letter and contain only `a-z`, `0-9`, `_` and `-`.
///
/// # Errors
///
/// Returns the first rule the value breaks.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    if trimmed.len() > limits::MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            field,
            max: limits::MAX_IDENTIFIER_LENGTH,
            actual: trimmed.len(),
        });
    }

    let mut chars = trimmed.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

    if !starts_with_letter || !rest_ok {
        return Err(ValidationError::InvalidIdentifier {
            field,
            value: trimmed.to_string(),
        });
    }

    Ok(trimmed.to_string())
}

/// Validate free-form description text.
///
/// # Errors
///
/// Returns `ValidationError::TooLong` if the text exceeds the limit.
pub fn validate_description(value: &str) -> Result<String, ValidationError> {
    let sanitized: String = value
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    let length = sanitized.chars().count();
    if length > limits::MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "description",
            max: limits::MAX_DESCRIPTION_LENGTH,
            actual: length,
        });
    }

    Ok(sanitized)
}

/// Normalise an email address for storage and lookup.
///
/// Trims, applies NFKC (so look-alike code points collapse onto one account),
/// lowercases, then checks syntax.
///
/// # Errors
///
/// Returns `ValidationError::InvalidEmail` for malformed addresses.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let normalized: String = raw.trim().nfkc().collect::<String>().to_lowercase();

    if normalized.is_empty() {
        return Err(ValidationError::Empty { field: "email" });
    }

    if normalized.len() > limits::MAX_EMAIL_LENGTH || !normalized.validate_email() {
        return Err(ValidationError::InvalidEmail(raw.trim().to_string()));
    }

    Ok(normalized)
}

/// Check a new password against length rules.
///
/// # Errors
///
/// Returns an error if the password is too short or too long.
pub fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();

    if length < limits::MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password",
            min: limits::MIN_PASSWORD_LENGTH,
        });
    }

    if password.len() > limits::MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "password",
            max: limits::MAX_PASSWORD_LENGTH,
            actual: password.len(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert_eq!(validate_identifier("resource", " grades ").unwrap(), "grades");
        assert_eq!(
            validate_identifier("role", "super_admin").unwrap(),
            "super_admin"
        );
        assert!(matches!(
            validate_identifier("resource", ""),
            Err(ValidationError::Empty { .. })
        ));
        assert!(matches!(
            validate_identifier("resource", "Grades"),
            Err(ValidationError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            validate_identifier("action", "1edit"),
            Err(ValidationError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            validate_identifier("action", "ed:it"),
            Err(ValidationError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            validate_identifier("role", &"a".repeat(65)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Admin@School.EDU ").unwrap(),
            "admin@school.edu"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(matches!(
            normalize_email("   "),
            Err(ValidationError::Empty { .. })
        ));
    }

    #[test]
    fn test_description_strips_control_chars() {
        assert_eq!(
            validate_description("Edit\x00 grades\n").unwrap(),
            "Edit grades"
        );
        assert!(validate_description(&"x".repeat(600)).is_err());
    }

    #[test]
    fn test_new_password_rules() {
        assert!(validate_new_password("short").is_err());
        assert!(validate_new_password("long-enough").is_ok());
    }

    #[test]
    fn test_catalog_error_message_lists_issues() {
        let err = ValidationError::Catalog {
            issues: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "catalog rejected (2 issue(s)): a; b");
    }
}
