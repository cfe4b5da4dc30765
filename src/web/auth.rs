//! # Bearer Token Verification
//!
//! HMAC-signed bearer tokens shared with the external token issuance
//! service. This core only verifies; it never mints tokens. The same
//! authenticator serves the REST middleware and the WebSocket handshake.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::AuthConfig;
use crate::constants::Role;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token validation error: {0}")]
    TokenValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("JWT processing error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Authorization header must use Bearer scheme")]
    InvalidAuthFormat,

    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

/// Claims carried by floor credentials
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,
    /// Principal role, one of operator/supervisor/admin
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

impl Claims {
    /// Synthetic identity used when authentication is disabled (development)
    pub fn local_admin() -> Self {
        Self {
            sub: "local".to_string(),
            role: Role::Admin.as_str().to_string(),
            exp: 0,
            iat: 0,
        }
    }

    pub fn role(&self) -> Result<Role, AuthError> {
        self.role
            .parse()
            .map_err(|_| AuthError::UnknownRole(self.role.clone()))
    }

    /// Numeric user id when the subject is numeric; used to attribute
    /// lifecycle operations
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Token verifier configured from [`AuthConfig`]
#[derive(Clone)]
pub struct JwtAuthenticator {
    enabled: bool,
    decoding_key: Option<DecodingKey>,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;

        if !config.enabled {
            debug!("Bearer authentication disabled");
            return Ok(Self {
                enabled: false,
                decoding_key: None,
                validation,
            });
        }

        if config.secret.is_empty() {
            return Err(AuthError::ConfigurationError(
                "Auth secret not configured".to_string(),
            ));
        }

        Ok(Self {
            enabled: true,
            decoding_key: Some(DecodingKey::from_secret(config.secret.as_bytes())),
            validation,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Validate a bearer token and extract its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let key = self.decoding_key.as_ref().ok_or_else(|| {
            AuthError::ConfigurationError("Authentication is disabled".to_string())
        })?;

        let data = decode::<Claims>(token, key, &self.validation)
            .map_err(|e| AuthError::TokenValidationError(e.to_string()))?;

        // Role must be known before the token grants anything
        data.claims.role()?;
        Ok(data.claims)
    }
}

/// Extract the token from a `Bearer <token>` header value
pub fn extract_bearer_token(auth_header: &str) -> Result<&str, AuthError> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthFormat)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthFormat);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            enabled: true,
            secret: secret.to_string(),
            leeway_seconds: 30,
        }
    }

    fn token_for(secret: &str, role: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "42".to_string(),
            role: role.to_string(),
            exp: now + exp_offset,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_round_trip() {
        let authenticator = JwtAuthenticator::from_config(&config("secret")).unwrap();
        let claims = authenticator
            .validate_token(&token_for("secret", "supervisor", 3600))
            .unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role().unwrap(), Role::Supervisor);
        assert_eq!(claims.user_id(), Some(42));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let authenticator = JwtAuthenticator::from_config(&config("right")).unwrap();
        assert!(authenticator
            .validate_token(&token_for("wrong", "operator", 3600))
            .is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let authenticator = JwtAuthenticator::from_config(&config("secret")).unwrap();
        assert!(authenticator
            .validate_token(&token_for("secret", "operator", -3600))
            .is_err());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let authenticator = JwtAuthenticator::from_config(&config("secret")).unwrap();
        assert!(authenticator
            .validate_token(&token_for("secret", "intruder", 3600))
            .is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123").unwrap(), "abc123");
        assert!(extract_bearer_token("Basic abc123").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
        assert!(extract_bearer_token("abc123").is_err());
    }
}
