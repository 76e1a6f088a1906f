//! Role-based access control for Registrar.
//!
//! This crate provides:
//! - Password hashing and verification (Argon2id) with a bounded hashing pool
//! - Signed, time-bounded bearer tokens
//! - The permission/role catalog model and its validation
//! - Idempotent catalog seeding with fallback admin provisioning
//! - The authorization gate consulted by every protected action

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Idempotent catalog reconciliation.
pub mod bootstrap;
mod catalog;
mod credentials;
mod gate;
/// Student and employee identifier generation.
pub mod identifiers;
mod login;
/// Persistence seam and its implementations.
pub mod store;
mod token;
mod users;

pub use bootstrap::{AdminOutcome, BootstrapReport, Bootstrapper, FallbackAdmin, initialize_rbac};
pub use catalog::{
    Catalog, CatalogDocument, Permission, PermissionDecl, PermissionKey, Role, RoleDecl,
};
pub use credentials::{CredentialService, HashingPool, generate_password, random_string};
pub use gate::AccessGate;
pub use login::{Authenticator, LoginOutcome};
pub use store::{MemoryStore, RbacStore, SledStore, StoreError};
pub use token::{Claims, Identity, IssuedToken, SigningSecret, TokenService};
pub use users::{NewUser, PersonalInfo, PublicUser, User};

use registrar_core::ValidationError;
use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input or catalog declaration.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Natural-key collision.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The persistent store is unreachable. Fatal for the current operation.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Token is past its expiry.
    #[error("Token expired")]
    TokenExpired,

    /// Token could not be decoded.
    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    /// Token signature does not match the signing secret.
    #[error("Token signature mismatch")]
    SignatureMismatch,

    /// Invalid credentials provided.
    ///
    /// Deliberately carries no detail so callers cannot tell unknown
    /// accounts from wrong passwords.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Permission denied.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Referenced record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Password hashing failed.
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Unavailable(msg) | StoreError::Corrupt(msg) => Self::Persistence(msg),
        }
    }
}
