use super::model::{Identity, TokenPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token response for OAuth callbacks and rotations
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn from_pair(pair: &TokenPair, now: DateTime<Utc>) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.to_string(),
            token_type: "Bearer".to_string(),
            expires_in: (pair.access_expires_at - now).num_seconds().max(0),
        }
    }
}

/// Refresh token request. The token may also come from a header or cookie.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// What a verified access token says about the caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
