use super::error::StoreError;
use super::model::{Identity, Invalidation, RefreshRecord, TokenId};
use chrono::Duration;
use uuid::Uuid;

/// Key-value backend for refresh-token state, keyed by token id, with per-entry expiry.
///
/// `invalidate` is the correctness-critical operation: it must flip the `used` flag with an
/// atomic check-and-set so that of two concurrent rotations of the same token exactly one
/// observes `Invalidation::Invalidated`.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `record`, expiring after `ttl`.
    async fn put(&self, record: &RefreshRecord, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, token_id: &TokenId) -> Result<Option<RefreshRecord>, StoreError>;

    /// Mark the record used. Idempotent.
    async fn invalidate(&self, token_id: &TokenId) -> Result<Invalidation, StoreError>;

    /// Remove every record of `identity`, used or not. Returns how many were removed.
    async fn delete_all_for_identity(&self, identity: Identity) -> Result<u64, StoreError>;

    /// Remove every record of one rotation chain.
    async fn delete_session(&self, identity: Identity, session_id: Uuid) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
