use crate::domain::auth::{Identity, Invalidation, RefreshRecord, SessionStore, StoreError, TokenId};
use chrono::Duration;
use std::future::Future;
use std::time::Duration as StdDuration;
use uuid::Uuid;

/// Puts a deadline on every call of the wrapped store. A missed deadline is a store
/// failure, never an answer.
pub struct BoundedSessionStore<S> {
    inner: S,
    timeout: StdDuration,
}

impl<S: SessionStore> BoundedSessionStore<S> {
    pub fn new(inner: S, timeout: StdDuration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "session store call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: SessionStore> SessionStore for BoundedSessionStore<S> {
    async fn put(&self, record: &RefreshRecord, ttl: Duration) -> Result<(), StoreError> {
        self.bounded("put", self.inner.put(record, ttl)).await
    }

    async fn get(&self, token_id: &TokenId) -> Result<Option<RefreshRecord>, StoreError> {
        self.bounded("get", self.inner.get(token_id)).await
    }

    async fn invalidate(&self, token_id: &TokenId) -> Result<Invalidation, StoreError> {
        self.bounded("invalidate", self.inner.invalidate(token_id)).await
    }

    async fn delete_all_for_identity(&self, identity: Identity) -> Result<u64, StoreError> {
        self.bounded("delete_all_for_identity", self.inner.delete_all_for_identity(identity))
            .await
    }

    async fn delete_session(&self, identity: Identity, session_id: Uuid) -> Result<u64, StoreError> {
        self.bounded("delete_session", self.inner.delete_session(identity, session_id))
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", self.inner.ping()).await
    }
}
