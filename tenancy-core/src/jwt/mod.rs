//! Identity token verification
//!
//! Tokens are issued by the external identity provider. Only the subject is
//! trusted; roles and scope always come from the role assignment rows.

use crate::config::JwtConfig;
use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl IdentityClaims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Token subject is not a user id".to_string()))
    }
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            config,
        }
    }

    /// Strict leeway (5 seconds) instead of the default 60 seconds.
    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 5;
        v.validate_aud = false;
        v.set_issuer(&[&self.config.issuer]);
        v
    }

    /// Issue an identity token. Used by tooling and tests; production tokens
    /// come from the identity provider.
    pub fn create_identity_token(&self, user_id: Uuid, ttl_secs: i64) -> Result<String> {
        let now = Utc::now();
        let claims = IdentityClaims {
            sub: user_id.to_string(),
            email: None,
            iss: self.config.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify and decode an identity token
    pub fn verify_identity_token(&self, token: &str) -> Result<IdentityClaims> {
        let token_data = decode::<IdentityClaims>(token, &self.decoding_key, &self.strict_validation())?;
        Ok(token_data.claims)
    }
}
