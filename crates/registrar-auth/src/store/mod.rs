//! The persistence seam.
//!
//! Every operation in this crate takes an explicit `&impl RbacStore`, so the
//! sled-backed store used in deployments and the in-memory double used in
//! tests are interchangeable.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use registrar_core::{PermissionId, UserId};
use thiserror::Error;

use crate::catalog::{Permission, PermissionKey, Role};
use crate::users::User;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same natural key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The record to update does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored record could not be decoded or encoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The store itself cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the failure affects the whole store rather than one record.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Persistence operations the access-control core consumes.
///
/// Inserts enforce natural-key uniqueness and fail with
/// [`StoreError::Conflict`] on collision. Updates replace a whole record
/// in one step, so readers see either the old or the new version.
pub trait RbacStore: Send + Sync {
    /// Cheap reachability check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store cannot serve requests.
    fn ping(&self) -> Result<(), StoreError>;

    /// Look up a permission by natural key.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    fn find_permission(&self, key: &PermissionKey) -> Result<Option<Permission>, StoreError>;

    /// Look up a permission by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    fn get_permission(&self, id: &PermissionId) -> Result<Option<Permission>, StoreError>;

    /// Insert a new permission.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the natural key is taken.
    fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError>;

    /// Replace an existing permission (same ID and key).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no permission has this ID.
    fn update_permission(&self, permission: &Permission) -> Result<(), StoreError>;

    /// List all permissions.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    fn list_permissions(&self) -> Result<Vec<Permission>, StoreError>;

    /// Look up a role by name.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError>;

    /// Insert a new role.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the name is taken.
    fn insert_role(&self, role: &Role) -> Result<(), StoreError>;

    /// Replace an existing role (same ID and name), including its grant set.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no role has this ID.
    fn update_role(&self, role: &Role) -> Result<(), StoreError>;

    /// List all roles.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    fn list_roles(&self) -> Result<Vec<Role>, StoreError>;

    /// Look up a user by normalised email.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Look up a user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the email is taken.
    fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Replace an existing user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no user has this ID, `Conflict` if a changed
    /// email collides with another account.
    fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// List all users.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Atomically increment and return the counter for `scope` (starting at 1).
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    fn next_sequence(&self, scope: &str) -> Result<u64, StoreError>;
}
