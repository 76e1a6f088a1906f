//! Student and employee identifiers.
//!
//! Identifiers are `STU{year}{DEPT}{suffix}` and `EMP{DEPT}{ROLE}{suffix}`,
//! where `DEPT` and `ROLE` are the first three alphanumeric characters of
//! the input, upper-cased.
//!
//! Two suffixes are available. The free functions use the last six digits
//! of the current millisecond timestamp; two calls within the same
//! millisecond (or exactly 1000 seconds apart) collide. [`IdentifierGenerator`]
//! draws a per-prefix counter from the store instead and never collides.

use chrono::{DateTime, Utc};
use registrar_core::ValidationError;

use super::AuthError;
use super::store::RbacStore;

const CODE_LENGTH: usize = 3;
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 9999;

fn code(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let code: String = value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(CODE_LENGTH)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if code.is_empty() {
        Err(ValidationError::Empty { field })
    } else {
        Ok(code)
    }
}

fn check_year(year: i32) -> Result<i32, ValidationError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(year)
    } else {
        Err(ValidationError::InvalidValue {
            field: "year",
            value: year.to_string(),
        })
    }
}

fn student_prefix(year: i32, department: &str) -> Result<String, ValidationError> {
    Ok(format!("STU{}{}", check_year(year)?, code("department", department)?))
}

fn employee_prefix(department: &str, role: &str) -> Result<String, ValidationError> {
    Ok(format!(
        "EMP{}{}",
        code("department", department)?,
        code("role", role)?
    ))
}

fn timestamp_suffix(now: DateTime<Utc>) -> String {
    format!("{:06}", now.timestamp_millis().rem_euclid(1_000_000))
}

/// Student identifier with a timestamp suffix.
///
/// # Errors
///
/// Returns a validation error for an out-of-range year or a department with
/// no alphanumeric characters.
pub fn generate_student_id(year: i32, department: &str) -> Result<String, AuthError> {
    student_id_at(year, department, Utc::now())
}

/// Student identifier with the suffix taken from `now`.
///
/// # Errors
///
/// See [`generate_student_id`].
pub fn student_id_at(year: i32, department: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
    Ok(format!("{}{}", student_prefix(year, department)?, timestamp_suffix(now)))
}

/// Employee identifier with a timestamp suffix.
///
/// # Errors
///
/// Returns a validation error if department or role has no alphanumeric
/// characters.
pub fn generate_employee_id(department: &str, role: &str) -> Result<String, AuthError> {
    employee_id_at(department, role, Utc::now())
}

/// Employee identifier with the suffix taken from `now`.
///
/// # Errors
///
/// See [`generate_employee_id`].
pub fn employee_id_at(
    department: &str,
    role: &str,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    Ok(format!("{}{}", employee_prefix(department, role)?, timestamp_suffix(now)))
}

/// Collision-free identifiers backed by store sequences.
pub struct IdentifierGenerator<'a, S: RbacStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RbacStore + ?Sized> IdentifierGenerator<'a, S> {
    /// Create a generator over a store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Next student identifier for a year and department.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a store error.
    pub fn next_student_id(&self, year: i32, department: &str) -> Result<String, AuthError> {
        self.next(&student_prefix(year, department)?)
    }

    /// Next employee identifier for a department and role.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a store error.
    pub fn next_employee_id(&self, department: &str, role: &str) -> Result<String, AuthError> {
        self.next(&employee_prefix(department, role)?)
    }

    fn next(&self, prefix: &str) -> Result<String, AuthError> {
        let n = self.store.next_sequence(&format!("id:{prefix}"))?;
        Ok(format!("{prefix}{n:04}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let now = Utc.timestamp_millis_opt(1_718_000_123_456).unwrap();

        assert_eq!(
            student_id_at(2024, "Computer Science", now).unwrap(),
            "STU2024COM123456"
        );
        assert_eq!(
            employee_id_at("math", "teacher", now).unwrap(),
            "EMPMATTEA123456"
        );
    }

    #[test]
    fn test_short_and_padded_codes() {
        let now = Utc.timestamp_millis_opt(1_000_000_000_042).unwrap();
        assert_eq!(student_id_at(2025, "  a-i ", now).unwrap(), "STU2025AI000042");
    }

    #[test]
    fn test_timestamp_collision_window() {
        let a = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let b = Utc.timestamp_millis_opt(1_700_001_000_000).unwrap();
        assert_eq!(
            student_id_at(2024, "cse", a).unwrap(),
            student_id_at(2024, "cse", b).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            generate_student_id(24, "cse"),
            Err(AuthError::Validation(ValidationError::InvalidValue { .. }))
        ));
        assert!(matches!(
            generate_employee_id("---", "teacher"),
            Err(AuthError::Validation(ValidationError::Empty { field: "department" }))
        ));
        assert!(generate_employee_id("cse", "").is_err());
    }

    #[test]
    fn test_sequence_ids_are_unique_per_prefix() {
        let store = MemoryStore::new();
        let ids = IdentifierGenerator::new(&store);

        assert_eq!(ids.next_student_id(2024, "cse").unwrap(), "STU2024CSE0001");
        assert_eq!(ids.next_student_id(2024, "cse").unwrap(), "STU2024CSE0002");
        assert_eq!(ids.next_student_id(2025, "cse").unwrap(), "STU2025CSE0001");
        assert_eq!(ids.next_employee_id("cse", "teacher").unwrap(), "EMPCSETEA0001");
    }
}
