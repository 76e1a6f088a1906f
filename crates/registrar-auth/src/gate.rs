//! Authorization decisions.

use tracing::{debug, warn};

use super::AuthError;
use super::catalog::Permission;
use super::store::RbacStore;
use super::token::TokenService;
use super::users::User;

/// Decides whether a user may perform an action on a resource.
///
/// Decisions are taken against the current catalog on every call: a role
/// change takes effect immediately for tokens already issued. Any store
/// failure denies.
pub struct AccessGate<'a, S: RbacStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RbacStore + ?Sized> AccessGate<'a, S> {
    /// Create a gate over a store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Whether `user` may perform `action` on `resource`.
    #[must_use]
    pub fn can(&self, user: &User, resource: &str, action: &str) -> bool {
        if !user.is_active() {
            debug!(user_id = %user.id, status = %user.status, "Denied: account not active");
            return false;
        }

        let role = match self.store.find_role(&user.role) {
            Ok(Some(role)) => role,
            Ok(None) => {
                warn!(user_id = %user.id, role = %user.role, "Denied: unknown role");
                return false;
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Denied: role lookup failed");
                return false;
            }
        };

        for id in &role.permission_ids {
            match self.store.get_permission(id) {
                Ok(Some(permission)) if permission.key.matches(resource, action) => return true,
                Ok(_) => {}
                Err(e) => {
                    warn!(user_id = %user.id, permission_id = %id, error = %e, "Denied: permission lookup failed");
                    return false;
                }
            }
        }

        debug!(user_id = %user.id, role = %role.name, resource, action, "Denied: not granted");
        false
    }

    /// Like [`can`](Self::can), as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PermissionDenied`] if the action is not allowed.
    pub fn authorize(&self, user: &User, resource: &str, action: &str) -> Result<(), AuthError> {
        if self.can(user, resource, action) {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied(format!("{resource}:{action}")))
        }
    }

    /// Permissions currently granted by a role, sorted by key.
    ///
    /// Grants whose permission no longer exists are skipped.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown role, or a store error.
    pub fn permissions_for(&self, role_name: &str) -> Result<Vec<Permission>, AuthError> {
        let role = self
            .store
            .find_role(role_name)?
            .ok_or_else(|| AuthError::NotFound(format!("role '{role_name}'")))?;

        let mut permissions = Vec::with_capacity(role.permission_ids.len());
        for id in &role.permission_ids {
            if let Some(permission) = self.store.get_permission(id)? {
                permissions.push(permission);
            }
        }
        permissions.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(permissions)
    }

    /// Authenticate a bearer header and authorize the action in one step.
    ///
    /// The token only identifies the account; status and role are read
    /// from the store so suspensions take effect immediately.
    ///
    /// # Errors
    ///
    /// Returns a token error for a missing or bad token,
    /// `InvalidCredentials` if the account no longer exists, or
    /// `PermissionDenied`.
    pub fn admit(
        &self,
        tokens: &TokenService,
        authorization: &str,
        resource: &str,
        action: &str,
    ) -> Result<User, AuthError> {
        let token = TokenService::extract_from_header(authorization)
            .ok_or_else(|| AuthError::TokenMalformed("missing bearer token".to_string()))?;
        let claims = tokens.verify(token)?;

        let user = self
            .store
            .get_user(&claims.sub)?
            .ok_or(AuthError::InvalidCredentials)?;

        self.authorize(&user, resource, action)?;
        Ok(user)
    }
}
