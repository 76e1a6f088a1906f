//! CLI command implementations.

pub mod catalog;
pub mod check;
pub mod ids;
pub mod login;
pub mod seed;
pub mod token;
pub mod user;

pub use catalog::run_catalog_show;
pub use check::run_check;
pub use ids::run_ids;
pub use login::run_login;
pub use seed::run_seed;
pub use token::run_token;
pub use user::run_user;

use std::path::Path;

use anyhow::Context as _;
use registrar_auth::{
    Catalog, CredentialService, HashingPool, RbacStore, SledStore, TokenService, User,
};
use registrar_core::{Config, normalize_email};

/// Loaded configuration and the services built from it.
pub struct Context {
    /// Effective configuration.
    pub config: Config,
}

impl Context {
    /// Load configuration from `path`, or from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is invalid.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
                .with_env_overrides(),
            None => Config::load_default().context("Failed to load config")?,
        };
        config.validate().context("Invalid configuration")?;
        Ok(Self { config })
    }

    /// Open the persistent store, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened.
    pub fn open_store(&self) -> anyhow::Result<SledStore> {
        let dir = self.config.data_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        SledStore::open(&dir).with_context(|| format!("Failed to open store at {}", dir.display()))
    }

    /// Credential service with the configured hashing parameters.
    ///
    /// # Errors
    ///
    /// Returns error if the parameters are rejected.
    pub fn credentials(&self) -> anyhow::Result<CredentialService> {
        CredentialService::from_config(&self.config.auth).context("Invalid hashing configuration")
    }

    /// Hashing pool with the configured width.
    ///
    /// # Errors
    ///
    /// Returns error if the parameters are rejected.
    pub fn hashing_pool(&self) -> anyhow::Result<HashingPool> {
        HashingPool::from_config(&self.config.auth).context("Invalid hashing configuration")
    }

    /// Token service with the configured secret.
    ///
    /// # Errors
    ///
    /// Returns error if no usable secret is configured.
    pub fn tokens(&self) -> anyhow::Result<TokenService> {
        TokenService::from_config(&self.config.auth).context("Cannot sign tokens")
    }

    /// Catalog from `path`, the configured catalog, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be read or is rejected.
    pub fn catalog(&self, path: Option<&Path>) -> anyhow::Result<Catalog> {
        match path.or(self.config.auth.catalog_path.as_deref()) {
            Some(path) => Catalog::load(path)
                .with_context(|| format!("Invalid catalog {}", path.display())),
            None => Catalog::builtin().context("Built-in catalog is invalid"),
        }
    }
}

/// Look up a user by email, failing if absent.
///
/// # Errors
///
/// Returns error if the email is invalid, the store fails, or no user matches.
pub fn find_user(store: &impl RbacStore, email: &str) -> anyhow::Result<User> {
    let email = normalize_email(email)?;
    store
        .find_user_by_email(&email)
        .context("Failed to look up user")?
        .ok_or_else(|| anyhow::anyhow!("User not found: {email}"))
}
