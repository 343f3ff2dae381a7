use super::error::{AuthError, StoreError};
use super::jwt::TokenSigner;
use super::model::{Identity, Invalidation, RefreshRecord, TokenId, TokenPair};
use super::store::SessionStore;
use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

/// Pause before the single retry of a transient store failure during issuance.
const ISSUE_RETRY_BACKOFF: std::time::Duration = std::time::Duration::from_millis(50);

/// What a replayed refresh token costs its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayPolicy {
    /// Revoke every session of the identity.
    #[default]
    RevokeAllSessions,
    /// Revoke only the rotation chain the replayed token belongs to.
    RevokeSession,
}

impl std::str::FromStr for ReplayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revoke_all" => Ok(Self::RevokeAllSessions),
            "revoke_session" => Ok(Self::RevokeSession),
            other => Err(format!("unknown replay policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenLifetimes {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(30),
        }
    }
}

/// Issues, rotates and revokes access/refresh pairs. Holds no session state itself.
pub struct TokenIssuer {
    signer: Arc<TokenSigner>,
    store: Arc<dyn SessionStore>,
    lifetimes: TokenLifetimes,
    replay_policy: ReplayPolicy,
}

impl TokenIssuer {
    pub fn new(
        signer: Arc<TokenSigner>,
        store: Arc<dyn SessionStore>,
        lifetimes: TokenLifetimes,
        replay_policy: ReplayPolicy,
    ) -> Self {
        Self {
            signer,
            store,
            lifetimes,
            replay_policy,
        }
    }

    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }

    /// Start a new session for `identity`.
    pub async fn issue(&self, identity: Identity) -> Result<TokenPair, AuthError> {
        let pair = self.issue_for_session(identity, Uuid::new_v4()).await?;
        tracing::info!(identity = %identity, session_id = %pair.session_id, "session issued");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair. Single use: the presented token is dead
    /// afterwards whatever the outcome.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let token_id = TokenId::parse(refresh_token)
            .ok_or_else(|| AuthError::Malformed("refresh token has an unknown shape".to_string()))?;

        let record = match self.store.invalidate(&token_id).await? {
            Invalidation::Invalidated(record) => record,
            Invalidation::NotFound => return Err(AuthError::NotFound),
            Invalidation::AlreadyUsed(record) => {
                self.handle_replay(&record).await?;
                return Err(AuthError::AlreadyUsed);
            }
        };

        if record.is_expired_at(self.signer.clock().now()) {
            return Err(AuthError::Expired);
        }

        let pair = self.issue_for_session(record.identity, record.session_id).await?;

        // A replay of this token may have revoked the chain while the successor was being
        // written. Revocation removes the used predecessor, so its absence means the
        // successor must not survive.
        if self.store.get(&token_id).await?.is_none() {
            tracing::warn!(
                security = true,
                identity = %record.identity,
                session_id = %record.session_id,
                "session revoked during rotation, discarding successor"
            );
            self.store
                .delete_session(record.identity, record.session_id)
                .await?;
            return Err(AuthError::AlreadyUsed);
        }

        tracing::debug!(
            identity = %record.identity,
            session_id = %record.session_id,
            "refresh token rotated"
        );
        Ok(pair)
    }

    /// Delete every refresh record of `identity`. Outstanding access tokens stay valid
    /// until they expire.
    pub async fn revoke(&self, identity: Identity) -> Result<u64, AuthError> {
        let removed = self.store.delete_all_for_identity(identity).await?;
        tracing::info!(identity = %identity, removed, "all sessions revoked");
        Ok(removed)
    }

    /// End the session the refresh token belongs to. Unknown tokens are ignored; a
    /// rotated token is a replay and is handled as one.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let Some(token_id) = TokenId::parse(refresh_token) else {
            return Ok(());
        };
        if let Some(record) = self.store.get(&token_id).await? {
            if record.used {
                self.handle_replay(&record).await?;
                return Err(AuthError::AlreadyUsed);
            }
            self.store
                .delete_session(record.identity, record.session_id)
                .await?;
            tracing::info!(identity = %record.identity, session_id = %record.session_id, "session ended");
        }
        Ok(())
    }

    async fn handle_replay(&self, record: &RefreshRecord) -> Result<(), AuthError> {
        tracing::warn!(
            security = true,
            identity = %record.identity,
            session_id = %record.session_id,
            policy = ?self.replay_policy,
            "replayed refresh token, revoking"
        );
        match self.replay_policy {
            ReplayPolicy::RevokeAllSessions => {
                self.store.delete_all_for_identity(record.identity).await?;
            }
            ReplayPolicy::RevokeSession => {
                self.store
                    .delete_session(record.identity, record.session_id)
                    .await?;
            }
        }
        Ok(())
    }

    async fn issue_for_session(
        &self,
        identity: Identity,
        session_id: Uuid,
    ) -> Result<TokenPair, AuthError> {
        let now = self.signer.clock().now();
        let record = RefreshRecord {
            token_id: TokenId::generate(),
            identity,
            session_id,
            issued_at: now,
            expires_at: now + self.lifetimes.refresh_ttl,
            used: false,
        };

        self.put_with_retry(&record).await?;
        let (access_token, claims) = self.signer.sign(identity, self.lifetimes.access_ttl)?;

        Ok(TokenPair {
            access_token,
            refresh_token: record.token_id,
            identity,
            session_id,
            access_expires_at: claims.expires_at(),
            refresh_expires_at: record.expires_at,
        })
    }

    async fn put_with_retry(&self, record: &RefreshRecord) -> Result<(), StoreError> {
        match self.store.put(record, self.lifetimes.refresh_ttl).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "storing refresh record failed, retrying once");
                tokio::time::sleep(ISSUE_RETRY_BACKOFF).await;
                self.store.put(record, self.lifetimes.refresh_ttl).await
            }
        }
    }
}
