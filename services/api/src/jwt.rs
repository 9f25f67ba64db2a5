//! JWT service for session token issuance and validation
//!
//! Tokens are HS256-signed with a shared secret and carry the user id and
//! role. They are stateless: logging out clears the client cookie, but a copy
//! of the token stays valid until it expires.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{UserError, UserResult},
    models::{User, UserType},
};

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret used to sign and verify tokens
    pub secret: String,
    /// Session lifetime in seconds for regular users (default: 1 hour)
    pub expires_in: u64,
    /// Session lifetime in seconds for admins (default: 1 day)
    pub admin_expires_in: u64,
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User type at the time of login
    pub role: UserType,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Session lifetime in seconds for a role
    pub fn expiry_for(&self, role: UserType) -> u64 {
        if role.is_admin() {
            self.config.admin_expires_in
        } else {
            self.config.expires_in
        }
    }

    /// Issue a session token for a user
    pub fn issue(&self, user: &User) -> UserResult<String> {
        let now = now_secs()?;
        let claims = Claims {
            sub: user.id,
            role: user.user_type,
            iat: now,
            exp: now + self.expiry_for(user.user_type),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| UserError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Validate a session token and return its claims
    pub fn validate(&self, token: &str) -> UserResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Rejected session token");
                UserError::Unauthorized
            })
    }
}

fn now_secs() -> UserResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|e| UserError::Internal(format!("Failed to get current time: {}", e)))
}
