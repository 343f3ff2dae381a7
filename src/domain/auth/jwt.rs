use super::clock::Clock;
use super::error::AuthError;
use super::model::Identity;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Class of a signed token. Only access tokens are ever signed today, the field keeps
/// other token kinds from being replayed as access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Access,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String, // Identity
    pub iat: i64,    // Issued at
    pub exp: i64,    // Expiration time
    #[serde(rename = "typ")]
    pub token_class: TokenClass,
}

impl AccessClaims {
    pub fn new(identity: Identity, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: identity.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
            token_class: TokenClass::Access,
        }
    }

    pub fn identity(&self) -> Result<Identity, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::Malformed("subject is not an identity".to_string()))
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// HS256 signer/verifier over one shared secret. Build a new instance to rotate the secret.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock below.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Sign a fresh access token for `identity` valid for `ttl`.
    pub fn sign(&self, identity: Identity, ttl: Duration) -> Result<(String, AccessClaims), AuthError> {
        let claims = AccessClaims::new(identity, self.clock.now(), ttl);
        let token = self.sign_claims(&claims)?;
        Ok((token, claims))
    }

    pub fn sign_claims(&self, claims: &AccessClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Signature first, then expiry; each failure keeps its own kind.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed(e.to_string()),
            })?;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }
        claims.identity()?;

        Ok(claims)
    }
}
