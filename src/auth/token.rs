//! Signed session tokens.
//!
//! Tokens are compact HS256 JWTs carrying `{id, username, iat, exp}`. Verification is stateless:
//! nothing about an issued token is persisted server-side.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::models::Identity;

/// Default lifetime of a session token.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: i32,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identity recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionIdentity {
    pub id: i32,
    pub username: String,
}

impl From<Claims> for SessionIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    ExpiredToken,

    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token could not be parsed")]
    MalformedToken,

    #[error("token could not be signed: {0}")]
    Signing(String),
}

/// Issues and verifies session tokens with a single process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact; a token one second past `exp` is rejected.
        validation.leeway = 0;
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Lifetime of issued tokens, in seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            id: identity.id,
            username: identity.username.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<SessionIdentity, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| SessionIdentity::from(data.claims))
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::MalformedToken,
            })
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: 42,
            username: "a@b.com".to_string(),
            password_hash: "unused".to_string(),
            is_admin: false,
        }
    }

    #[test]
    fn verify_returns_issued_identity() {
        let codec = TokenCodec::new("test-secret", DEFAULT_TOKEN_TTL_SECS);
        let token = codec.issue(&identity()).unwrap();

        let verified = codec.verify(&token).unwrap();
        assert_eq!(verified.id, 42);
        assert_eq!(verified.username, "a@b.com");
    }

    #[test]
    fn verification_is_repeatable() {
        let codec = TokenCodec::new("test-secret", DEFAULT_TOKEN_TTL_SECS);
        let token = codec.issue(&identity()).unwrap();

        assert_eq!(codec.verify(&token), codec.verify(&token));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = TokenCodec::new("test-secret", DEFAULT_TOKEN_TTL_SECS);
        let issued = Utc::now() - Duration::hours(2);
        let token = codec.issue_at(&identity(), issued).unwrap();

        assert_eq!(codec.verify(&token), Err(TokenError::ExpiredToken));
    }

    #[test]
    fn token_from_other_secret_has_invalid_signature() {
        let issuer = TokenCodec::new("secret-one", DEFAULT_TOKEN_TTL_SECS);
        let verifier = TokenCodec::new("secret-two", DEFAULT_TOKEN_TTL_SECS);
        let token = issuer.issue(&identity()).unwrap();

        assert_eq!(verifier.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let codec = TokenCodec::new("test-secret", DEFAULT_TOKEN_TTL_SECS);
        let token = codec.issue(&identity()).unwrap();
        let other = codec
            .issue(&Identity {
                id: 1,
                username: "root@b.com".to_string(),
                ..identity()
            })
            .unwrap();

        // Graft the second token's payload onto the first token's signature.
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(codec.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = TokenCodec::new("test-secret", DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(codec.verify("not-a-token"), Err(TokenError::MalformedToken));
        assert_eq!(codec.verify(""), Err(TokenError::MalformedToken));
    }

    #[test]
    fn expiry_is_one_ttl_after_issuance() {
        let codec = TokenCodec::new("test-secret", DEFAULT_TOKEN_TTL_SECS);
        let now = Utc::now();
        let token = codec.issue_at(&identity(), now).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let claims = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &validation,
        )
        .unwrap()
        .claims;
        assert_eq!(claims.exp - claims.iat, 3600);
    }
}
