//! Configuration loading and validation.
//!
//! Config is JSON5 with camelCase keys.
//! Config location: `~/.registrar/registrar.json`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Default Argon2 iteration count.
const DEFAULT_HASH_COST: u32 = 12;
/// Default Argon2 memory cost in KiB (19 MiB).
const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;
/// Default access token lifetime in minutes.
const DEFAULT_TOKEN_TTL_MINUTES: u64 = 24 * 60;
/// Longest accepted token lifetime in minutes (one year).
pub const MAX_TOKEN_TTL_MINUTES: u64 = 365 * 24 * 60;
/// Minimum signing secret length in bytes.
pub const MIN_TOKEN_SECRET_LENGTH: usize = 32;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Persistent store configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential, token, and bootstrap configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Global settings.
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Config {
    /// Load configuration from the default location, with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::load(&path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("registrar.json")
    }

    /// Get the Registrar state directory.
    ///
    /// Uses `REGISTRAR_STATE_DIR` env var if set, otherwise `~/.registrar`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("REGISTRAR_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".registrar")
        } else {
            PathBuf::from(".registrar")
        }
    }

    /// Directory holding the persistent store.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Apply environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.auth = self.auth.with_env_overrides();
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing every rejected field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.check()
    }
}

/// Persistent store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Store directory. Defaults to `<state dir>/data`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Credential, token, and bootstrap configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Argon2 iteration count (work factor).
    #[serde(default = "default_hash_cost")]
    #[validate(range(min = 1, max = 64))]
    pub hash_cost: u32,

    /// Argon2 memory cost in KiB.
    #[serde(default = "default_hash_memory_kib")]
    #[validate(range(min = 8, max = 1_048_576))]
    pub hash_memory_kib: u32,

    /// Argon2 lanes.
    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 16))]
    pub hash_parallelism: u32,

    /// Maximum concurrent hashing jobs on the blocking pool.
    #[serde(default = "default_hash_workers")]
    #[validate(range(min = 1, max = 256))]
    pub hash_workers: usize,

    /// Token signing secret. Required to issue or verify tokens.
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Default access token lifetime in minutes.
    #[serde(default = "default_token_ttl")]
    #[validate(range(min = 1, max = 525_600))]
    pub token_ttl_minutes: u64,

    /// Email of the fallback administrative identity created by bootstrap.
    #[serde(default = "default_admin_email")]
    #[validate(email)]
    pub fallback_admin_email: String,

    /// Role assigned to the fallback administrative identity.
    #[serde(default = "default_admin_role")]
    #[validate(length(min = 1, max = 64))]
    pub fallback_admin_role: String,

    /// Display name of the fallback administrative identity.
    #[serde(default = "default_admin_name")]
    pub fallback_admin_name: String,

    /// Declarative catalog file. The built-in catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

const fn default_hash_cost() -> u32 {
    DEFAULT_HASH_COST
}

const fn default_hash_memory_kib() -> u32 {
    DEFAULT_HASH_MEMORY_KIB
}

const fn default_one() -> u32 {
    1
}

const fn default_hash_workers() -> usize {
    2
}

const fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_MINUTES
}

fn default_admin_email() -> String {
    "admin@registrar.local".to_string()
}

fn default_admin_role() -> String {
    "super_admin".to_string()
}

fn default_admin_name() -> String {
    "System Administrator".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hash_cost: default_hash_cost(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_parallelism: default_one(),
            hash_workers: default_hash_workers(),
            token_secret: None,
            token_ttl_minutes: default_token_ttl(),
            fallback_admin_email: default_admin_email(),
            fallback_admin_role: default_admin_role(),
            fallback_admin_name: default_admin_name(),
            catalog_path: None,
        }
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Get the default token lifetime as Duration.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_minutes.saturating_mul(60))
    }

    /// Load config from environment variables (overrides).
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secret) = lookup("REGISTRAR_TOKEN_SECRET").filter(|s| !s.is_empty()) {
            self.token_secret = Some(secret);
        }

        if let Some(email) = lookup("REGISTRAR_ADMIN_EMAIL").filter(|s| !s.is_empty()) {
            self.fallback_admin_email = email;
        }

        self
    }

    /// Validate field ranges and formats.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` for out-of-range or malformed values.
    pub fn check(&self) -> Result<(), ConfigError> {
        Validate::validate(self).map_err(|e| ConfigError::Validation(e.to_string()))?;

        if let Some(secret) = &self.token_secret {
            if secret.len() < MIN_TOKEN_SECRET_LENGTH {
                return Err(ConfigError::Validation(format!(
                    "tokenSecret must be at least {MIN_TOKEN_SECRET_LENGTH} bytes"
                )));
            }
        }

        // Argon2 needs at least 8 KiB per lane.
        if self.hash_memory_kib < 8 * self.hash_parallelism {
            return Err(ConfigError::Validation(format!(
                "hashMemoryKib must be at least {} for {} lane(s)",
                8 * self.hash_parallelism,
                self.hash_parallelism
            )));
        }

        Ok(())
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the Argon2 iteration count.
    #[must_use]
    pub const fn hash_cost(mut self, cost: u32) -> Self {
        self.config.hash_cost = cost;
        self
    }

    /// Set the Argon2 memory cost in KiB.
    #[must_use]
    pub const fn hash_memory_kib(mut self, kib: u32) -> Self {
        self.config.hash_memory_kib = kib;
        self
    }

    /// Set the hashing pool width.
    #[must_use]
    pub const fn hash_workers(mut self, workers: usize) -> Self {
        self.config.hash_workers = workers;
        self
    }

    /// Set the token signing secret.
    #[must_use]
    pub fn token_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.token_secret = Some(secret.into());
        self
    }

    /// Set the default token lifetime in minutes.
    #[must_use]
    pub const fn token_ttl_minutes(mut self, minutes: u64) -> Self {
        self.config.token_ttl_minutes = minutes;
        self
    }

    /// Set the fallback administrative email.
    #[must_use]
    pub fn fallback_admin_email(mut self, email: impl Into<String>) -> Self {
        self.config.fallback_admin_email = email.into();
        self
    }

    /// Set the fallback administrative role.
    #[must_use]
    pub fn fallback_admin_role(mut self, role: impl Into<String>) -> Self {
        self.config.fallback_admin_role = role.into();
        self
    }

    /// Set the catalog file.
    #[must_use]
    pub fn catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.catalog_path = Some(path.into());
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

/// Global settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}
