use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Role;

/// Claims
///
/// The payload signed into every credential. Immutable once issued: a role or email
/// change requires issuing a new token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
}

/// Identity
///
/// The verified contents of a credential. This is what the access gate, the session
/// extractors and the handlers reason about; it is trusted without a database round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// VerifyCredential
///
/// The one capability the access gate needs from the token service. Kept as a trait
/// so the gate can be driven by counting or fixed verifiers in tests.
pub trait VerifyCredential {
    fn verify(&self, credential: &str) -> Option<Identity>;
}

/// TokenService
///
/// Issues and verifies HS256-signed credentials. The secret is injected at construction
/// and read-only afterwards, so one instance is shared by every request.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    /// How long an issued credential stays valid. Matches the cookie max-age.
    pub const TTL_DAYS: i64 = 7;

    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::days(Self::TTL_DAYS))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// issue
    ///
    /// Signs a credential for `(user_id, email, role)` expiring `ttl` from now.
    pub fn issue(&self, user_id: Uuid, email: &str, role: Role) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now.timestamp().max(0) as usize,
            exp: (now + self.ttl).timestamp().max(0) as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// verify
    ///
    /// Checks signature and expiry. Malformed, tampered and expired credentials all
    /// collapse into `None`; the reason is only visible at `debug` level.
    pub fn verify(&self, credential: &str) -> Option<Identity> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        match decode::<Claims>(credential, &self.decoding, &validation) {
            Ok(data) => Some(Identity {
                user_id: data.claims.sub,
                email: data.claims.email,
                role: data.claims.role,
            }),
            Err(e) => {
                tracing::debug!(reason = ?e.kind(), "credential rejected");
                None
            }
        }
    }
}

impl VerifyCredential for TokenService {
    fn verify(&self, credential: &str) -> Option<Identity> {
        TokenService::verify(self, credential)
    }
}
