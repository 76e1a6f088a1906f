//! # Registrar Core
//!
//! Shared building blocks for the Registrar access-control subsystem.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Identifier and email validation/normalisation
//! - Strongly-typed ids and account status shared by every other crate

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod types;
pub mod validation;

pub use config::{AuthConfig, AuthConfigBuilder, Config, ConfigError, LogFormat};
pub use types::{PermissionId, RoleId, UserId, UserStatus};
pub use validation::{ValidationError, normalize_email, validate_identifier};
