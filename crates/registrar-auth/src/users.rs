//! User accounts as seen by the access-control core.

use chrono::{DateTime, Utc};
use registrar_core::validation::validate_new_password;
use registrar_core::{UserId, UserStatus, normalize_email, validate_identifier};
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::credentials::CredentialService;

/// Personal details attached to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl PersonalInfo {
    /// Create personal info from a first and last name.
    #[must_use]
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: None,
        }
    }

    /// Split a display name on its last space.
    #[must_use]
    pub fn from_display_name(name: &str) -> Self {
        match name.trim().rsplit_once(' ') {
            Some((first, last)) => Self::new(first.trim(), last.trim()),
            None => Self::new(name.trim(), ""),
        }
    }

    /// Full display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// User account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalised email, unique across accounts.
    pub email: String,
    /// Argon2 password hash (stored, never exposed in public views).
    pub password_hash: String,
    /// Role name, resolved against the role catalog on every check.
    pub role: String,
    /// Account status.
    pub status: UserStatus,
    /// Personal details.
    pub personal_info: PersonalInfo,
    /// Whether the password must be changed at next sign-in.
    #[serde(default)]
    pub must_rotate_password: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user last logged in.
    pub last_login: Option<DateTime<Utc>>,
}

/// Fields needed to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Email address (normalised on creation).
    pub email: String,
    /// Role name.
    pub role: String,
    /// Personal details.
    pub personal_info: PersonalInfo,
    /// Initial status.
    pub status: UserStatus,
    /// Whether the initial password must be rotated.
    pub must_rotate_password: bool,
}

impl NewUser {
    /// Describe an active account with the given email and role.
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        role: impl Into<String>,
        personal_info: PersonalInfo,
    ) -> Self {
        Self {
            email: email.into(),
            role: role.into(),
            personal_info,
            status: UserStatus::Active,
            must_rotate_password: false,
        }
    }

    /// Require the password to be rotated at first sign-in.
    #[must_use]
    pub const fn with_rotation_required(mut self) -> Self {
        self.must_rotate_password = true;
        self
    }

    /// Set the initial status.
    #[must_use]
    pub const fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }
}

impl User {
    /// Create a user, hashing the password.
    ///
    /// # Errors
    ///
    /// Returns error if the email, role, or password is invalid, or hashing fails.
    pub fn create(
        new: NewUser,
        password: &str,
        credentials: &CredentialService,
    ) -> Result<Self, AuthError> {
        let email = normalize_email(&new.email)?;
        let role = validate_identifier("role", &new.role)?;
        validate_new_password(password)?;

        Ok(Self {
            id: UserId::generate(),
            email,
            password_hash: credentials.hash(password)?,
            role,
            status: new.status,
            personal_info: new.personal_info,
            must_rotate_password: new.must_rotate_password,
            created_at: Utc::now(),
            last_login: None,
        })
    }

    /// Verify a password against this user's hash.
    #[must_use]
    pub fn verify_password(&self, password: &str, credentials: &CredentialService) -> bool {
        credentials.verify(password, &self.password_hash)
    }

    /// Replace the user's password and clear any rotation requirement.
    ///
    /// # Errors
    ///
    /// Returns error if the password is rejected or hashing fails.
    pub fn set_password(
        &mut self,
        password: &str,
        credentials: &CredentialService,
    ) -> Result<(), AuthError> {
        validate_new_password(password)?;
        self.password_hash = credentials.hash(password)?;
        self.must_rotate_password = false;
        Ok(())
    }

    /// Whether the account may act at all.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Create a safe version of user for API responses (no password hash).
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            status: self.status,
            name: self.personal_info.full_name(),
            must_rotate_password: self.must_rotate_password,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

/// Public user representation (for API responses).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// Unique user ID.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Role name.
    pub role: String,
    /// Account status.
    pub status: UserStatus,
    /// Display name.
    pub name: String,
    /// Whether a password change is pending.
    pub must_rotate_password: bool,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// Last login time.
    pub last_login: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> CredentialService {
        CredentialService::new(1, 1024, 1).unwrap()
    }

    #[test]
    fn test_user_creation() {
        let new = NewUser::new(" Teacher@School.edu ", "teacher", PersonalInfo::new("Ada", "King"));
        let user = User::create(new, "password123", &credentials()).unwrap();

        assert_eq!(user.email, "teacher@school.edu");
        assert_eq!(user.role, "teacher");
        assert!(user.id.as_str().starts_with("user_"));
        assert!(user.is_active());
        assert!(!user.must_rotate_password);
        assert_ne!(user.password_hash, "password123");
    }

    #[test]
    fn test_user_creation_rejects_bad_input() {
        let creds = credentials();
        let bad_email = NewUser::new("nope", "teacher", PersonalInfo::default());
        assert!(matches!(
            User::create(bad_email, "password123", &creds),
            Err(AuthError::Validation(_))
        ));

        let short_password = NewUser::new("a@b.edu", "teacher", PersonalInfo::default());
        assert!(matches!(
            User::create(short_password, "short", &creds),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_password_verification_and_rotation() {
        let creds = credentials();
        let new = NewUser::new("admin@school.edu", "admin", PersonalInfo::default())
            .with_rotation_required();
        let mut user = User::create(new, "temporary-pw", &creds).unwrap();

        assert!(user.must_rotate_password);
        assert!(user.verify_password("temporary-pw", &creds));
        assert!(!user.verify_password("wrongpassword", &creds));

        user.set_password("brand-new-pw", &creds).unwrap();
        assert!(!user.must_rotate_password);
        assert!(user.verify_password("brand-new-pw", &creds));
        assert!(!user.verify_password("temporary-pw", &creds));
    }

    #[test]
    fn test_public_view_hides_hash() {
        let new = NewUser::new("a@b.edu", "student", PersonalInfo::new("Grace", "Hopper"))
            .with_status(UserStatus::Suspended);
        let user = User::create(new, "password123", &credentials()).unwrap();
        let public = serde_json::to_value(user.to_public()).unwrap();

        assert!(public.get("passwordHash").is_none());
        assert_eq!(public["name"], "Grace Hopper");
        assert_eq!(public["status"], "suspended");
    }

    #[test]
    fn test_display_name_split() {
        let info = PersonalInfo::from_display_name("System Administrator");
        assert_eq!(info.first_name, "System");
        assert_eq!(info.last_name, "Administrator");
        assert_eq!(PersonalInfo::from_display_name("Root").full_name(), "Root");
    }
}
