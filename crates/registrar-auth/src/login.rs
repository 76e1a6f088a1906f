//! Password sign-in and password changes.

use chrono::Utc;
use registrar_core::validation::validate_new_password;
use registrar_core::{UserId, ValidationError, normalize_email};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AuthError;
use super::credentials::HashingPool;
use super::store::RbacStore;
use super::token::{Identity, IssuedToken, TokenService};
use super::users::{PublicUser, User};

/// Successful sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    /// The signed-in account.
    pub user: PublicUser,
    /// Bearer token for subsequent requests.
    pub token: IssuedToken,
    /// Whether the caller must change the password before doing anything else.
    pub must_rotate_password: bool,
}

/// Email and password sign-in.
///
/// Every credential failure is reported as [`AuthError::InvalidCredentials`]
/// and costs one password verification, whether or not the account exists.
pub struct Authenticator<'a, S: RbacStore + ?Sized> {
    store: &'a S,
    hashing: &'a HashingPool,
    tokens: &'a TokenService,
}

impl<'a, S: RbacStore + ?Sized> Authenticator<'a, S> {
    /// Create an authenticator.
    #[must_use]
    pub const fn new(store: &'a S, hashing: &'a HashingPool, tokens: &'a TokenService) -> Self {
        Self {
            store,
            hashing,
            tokens,
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown email, wrong password, or
    /// non-active account; `Persistence` if the store fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let Some(mut user) = self.find(email)? else {
            self.hashing.verify_decoy(password.to_string()).await;
            return Err(AuthError::InvalidCredentials);
        };

        let valid = self
            .hashing
            .verify(password.to_string(), user.password_hash.clone())
            .await;

        if !valid || !user.is_active() {
            warn!(user_id = %user.id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        if self.hashing.credentials().needs_rehash(&user.password_hash) {
            match self.hashing.hash(password.to_string()).await {
                Ok(hash) => user.password_hash = hash,
                Err(e) => warn!(user_id = %user.id, error = %e, "Password rehash failed"),
            }
        }

        user.last_login = Some(Utc::now());
        self.store.update_user(&user)?;

        let token = self.tokens.issue(&Identity::from(&user))?;
        info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(LoginOutcome {
            must_rotate_password: user.must_rotate_password,
            user: user.to_public(),
            token,
        })
    }

    /// Change a password after re-checking the current one.
    ///
    /// Clears any pending rotation requirement.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` if the current password is wrong,
    /// `Validation` if the new one is rejected, `NotFound` for an unknown user.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        current: &str,
        new: &str,
    ) -> Result<PublicUser, AuthError> {
        let mut user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| AuthError::NotFound(user_id.to_string()))?;

        let valid = self
            .hashing
            .verify(current.to_string(), user.password_hash.clone())
            .await;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        validate_new_password(new)?;
        if new == current {
            return Err(ValidationError::InvalidValue {
                field: "password",
                value: "new password must differ from the current one".to_string(),
            }
            .into());
        }

        user.password_hash = self.hashing.hash(new.to_string()).await?;
        user.must_rotate_password = false;
        self.store.update_user(&user)?;

        info!(user_id = %user.id, "Password changed");
        Ok(user.to_public())
    }

    fn find(&self, email: &str) -> Result<Option<User>, AuthError> {
        let Ok(email) = normalize_email(email) else {
            return Ok(None);
        };
        Ok(self.store.find_user_by_email(&email)?)
    }
}
