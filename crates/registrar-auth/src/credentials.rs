//! Password hashing and random credential material.

use std::sync::{Arc, OnceLock};

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::{Rng, distributions::Alphanumeric};
use registrar_core::AuthConfig;
use tokio::sync::Semaphore;

use super::AuthError;

/// Characters used for generated passwords.
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// Argon2id password hashing with configured cost parameters.
pub struct CredentialService {
    params: Params,
    /// Hash used to burn equivalent time when an account does not exist.
    decoy: OnceLock<String>,
}

impl CredentialService {
    /// Create a credential service with explicit Argon2 parameters.
    ///
    /// # Errors
    ///
    /// Returns error if the parameters are outside Argon2's accepted ranges.
    pub fn new(cost: u32, memory_kib: u32, parallelism: u32) -> Result<Self, AuthError> {
        let params = Params::new(memory_kib, cost, parallelism, None)
            .map_err(|e| AuthError::Config(format!("Invalid hashing parameters: {e}")))?;

        Ok(Self {
            params,
            decoy: OnceLock::new(),
        })
    }

    /// Create a credential service from auth configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the configured parameters are rejected.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Self::new(
            config.hash_cost,
            config.hash_memory_kib,
            config.hash_parallelism,
        )
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a PHC string.
    ///
    /// # Errors
    ///
    /// Returns error if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Hashing(format!("Password hashing failed: {e}")))
    }

    /// Check a password against a stored hash.
    ///
    /// The comparison is constant-time inside Argon2. A hash that cannot be
    /// parsed never matches.
    #[must_use]
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is unreadable");
                return false;
            }
        };

        // Cost parameters come from the stored hash, not from `self.params`.
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Whether a stored hash was produced with different cost parameters.
    #[must_use]
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return true;
        };

        Params::try_from(&parsed).map_or(true, |stored| {
            stored.t_cost() != self.params.t_cost()
                || stored.m_cost() != self.params.m_cost()
                || stored.p_cost() != self.params.p_cost()
        })
    }

    /// Spend one verification's worth of work on a decoy hash.
    ///
    /// Used on paths where no account matched so response time does not
    /// reveal whether an email is registered.
    pub(crate) fn verify_decoy(&self, password: &str) {
        let decoy = self.decoy.get_or_init(|| {
            self.hash(&random_string(24)).unwrap_or_default()
        });
        let _ = self.verify(password, decoy);
    }
}

impl std::fmt::Debug for CredentialService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialService")
            .field("t_cost", &self.params.t_cost())
            .field("m_cost", &self.params.m_cost())
            .field("p_cost", &self.params.p_cost())
            .finish_non_exhaustive()
    }
}

/// Bounded dispatcher that runs hashing on tokio's blocking pool.
///
/// Keeps CPU-bound Argon2 work off the async executor and caps how many
/// hashes run at once.
#[derive(Clone)]
pub struct HashingPool {
    credentials: Arc<CredentialService>,
    permits: Arc<Semaphore>,
}

impl HashingPool {
    /// Create a pool allowing `workers` concurrent hashing jobs.
    #[must_use]
    pub fn new(credentials: Arc<CredentialService>, workers: usize) -> Self {
        Self {
            credentials,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Create a pool from auth configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the hashing parameters are rejected.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let credentials = Arc::new(CredentialService::from_config(config)?);
        Ok(Self::new(credentials, config.hash_workers))
    }

    /// The underlying credential service.
    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialService> {
        &self.credentials
    }

    /// Hash a password on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns error if hashing fails or the task is lost.
    pub async fn hash(&self, password: String) -> Result<String, AuthError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AuthError::Hashing(format!("Hashing pool closed: {e}")))?;

        let credentials = Arc::clone(&self.credentials);
        tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| AuthError::Hashing(format!("Hashing task failed: {e}")))?
    }

    /// Verify a password on the blocking pool.
    pub async fn verify(&self, password: String, hash: String) -> bool {
        let Ok(_permit) = self.permits.acquire().await else {
            return false;
        };

        let credentials = Arc::clone(&self.credentials);
        tokio::task::spawn_blocking(move || credentials.verify(&password, &hash))
            .await
            .unwrap_or(false)
    }

    /// Run a decoy verification on the blocking pool.
    pub(crate) async fn verify_decoy(&self, password: String) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };

        let credentials = Arc::clone(&self.credentials);
        let _ = tokio::task::spawn_blocking(move || credentials.verify_decoy(&password)).await;
    }
}

impl std::fmt::Debug for HashingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingPool")
            .field("available", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

/// Random alphanumeric string.
///
/// Suitable for non-secret identifiers only; use [`generate_password`] for
/// anything that guards access.
#[must_use]
pub fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a password from the operating system's secure RNG.
#[must_use]
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::rngs::OsRng;

    (0..length)
        .map(|_| char::from(PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())]))
        .collect()
}
