//! Bearer token issuance and verification.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::RngCore;
use registrar_core::{AuthConfig, UserId, config::MIN_TOKEN_SECRET_LENGTH};
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::users::User;

/// Token claims.
///
/// Only the role *name* is embedded; permissions are resolved against the
/// live catalog on every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: UserId,
    /// Account email.
    pub email: String,
    /// Role name.
    pub role: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// The identity a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// User ID.
    pub user_id: UserId,
    /// Account email.
    pub email: String,
    /// Role name.
    pub role: String,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

/// A freshly issued token together with the claims it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Encoded token.
    pub token: String,
    /// Claims embedded in the token.
    pub claims: Claims,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
    /// Token type (always "Bearer").
    pub token_type: String,
}

/// Signing secret that never appears in logs or debug output.
pub struct SigningSecret(SecretBox<str>);

impl SigningSecret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self(SecretBox::new(secret.into_boxed_str()))
    }

    fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningSecret([REDACTED])")
    }
}

/// Issues and verifies signed, time-bounded tokens.
///
/// Holds no session state; safe to share across threads.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: Duration,
}

impl TokenService {
    /// Create a token service with a signing secret and default lifetime.
    ///
    /// # Errors
    ///
    /// Returns error if the secret is shorter than the minimum length.
    pub fn new(secret: &SigningSecret, default_ttl: Duration) -> Result<Self, AuthError> {
        let raw = secret.expose().as_bytes();
        if raw.len() < MIN_TOKEN_SECRET_LENGTH {
            return Err(AuthError::Config(format!(
                "Token secret must be at least {MIN_TOKEN_SECRET_LENGTH} bytes"
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(raw),
            decoding_key: DecodingKey::from_secret(raw),
            default_ttl,
        })
    }

    /// Create a token service from auth configuration.
    ///
    /// # Errors
    ///
    /// Returns error if no signing secret is configured.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = config.token_secret.clone().ok_or_else(|| {
            AuthError::Config(
                "No token secret configured (set auth.tokenSecret or REGISTRAR_TOKEN_SECRET)"
                    .to_string(),
            )
        })?;

        Self::new(&SigningSecret::new(secret), config.token_ttl())
    }

    /// Generate a random 256-bit secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Issue a token with the configured secret and default lifetime.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, AuthError> {
        self.issue_with(identity, None, None)
    }

    /// Issue a token, optionally overriding the secret and lifetime.
    ///
    /// Lifetimes have one-second granularity; a fractional lifetime is
    /// rounded up so a non-zero lifetime never yields `exp == iat`.
    ///
    /// # Errors
    ///
    /// Returns error if the lifetime is out of range, the override secret is
    /// too short, or encoding fails.
    pub fn issue_with(
        &self,
        identity: &Identity,
        secret: Option<&SigningSecret>,
        ttl: Option<Duration>,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let iat = Utc::now().timestamp();
        let (exp, expires_at) = expiry(iat, ttl)?;

        let claims = Claims {
            sub: identity.user_id.clone(),
            email: identity.email.clone(),
            role: identity.role.clone(),
            iat,
            exp,
        };

        let override_key;
        let key = match secret {
            Some(secret) => {
                override_key = Self::new(secret, ttl)?.encoding_key;
                &override_key
            }
            None => &self.encoding_key,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| AuthError::Config(format!("Token encoding failed: {e}")))?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
            token_type: "Bearer".to_string(),
        })
    }

    /// Verify a token against the configured secret at the current time.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired`, `SignatureMismatch`, or `TokenMalformed`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, None, Utc::now())
    }

    /// Verify a token, optionally against a different secret.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired`, `SignatureMismatch`, or `TokenMalformed`.
    pub fn verify_with(
        &self,
        token: &str,
        secret: Option<&SigningSecret>,
    ) -> Result<Claims, AuthError> {
        self.verify_at(token, secret, Utc::now())
    }

    /// Verify a token as of `now`.
    ///
    /// A pure function of (token, now, secret). Expiry is strict: a token is
    /// expired once `now >= exp`, with no leeway.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired`, `SignatureMismatch`, or `TokenMalformed`.
    pub fn verify_at(
        &self,
        token: &str,
        secret: Option<&SigningSecret>,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        let override_key;
        let key = match secret {
            Some(secret) => {
                override_key = Self::new(secret, self.default_ttl)?.decoding_key;
                &override_key
            }
            None => &self.decoding_key,
        };

        let claims = decode::<Claims>(token, key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::SignatureMismatch,
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenMalformed(e.to_string()),
            })?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    /// Extract token from Authorization header.
    ///
    /// Expects format: "Bearer <token>"
    #[must_use]
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Compute the `exp` claim and its instant for a token issued at `iat`.
fn expiry(iat: i64, ttl: Duration) -> Result<(i64, DateTime<Utc>), AuthError> {
    let out_of_range = || AuthError::Config(format!("Token lifetime out of range: {ttl:?}"));

    let secs = ttl
        .as_secs()
        .checked_add(u64::from(ttl.subsec_nanos() > 0))
        .and_then(|s| i64::try_from(s).ok())
        .ok_or_else(out_of_range)?;
    let exp = iat.checked_add(secs).ok_or_else(out_of_range)?;
    let expires_at = DateTime::from_timestamp(exp, 0).ok_or_else(out_of_range)?;

    Ok((exp, expires_at))
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
