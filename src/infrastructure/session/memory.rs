use crate::domain::auth::{
    Clock, Identity, Invalidation, RefreshRecord, SessionStore, StoreError, TokenId,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// How often `put` sweeps expired entries out of the map.
const SWEEP_INTERVAL_MS: i64 = 60_000;

struct Slot {
    record: RefreshRecord,
    evict_at: DateTime<Utc>,
}

/// Process-local session store for development and tests.
///
/// Each key lives in one DashMap shard, so the entry lock makes `invalidate` an atomic
/// check-and-set. Entries past their TTL are treated as absent, dropped on access and
/// swept out by `put` at most once per interval.
pub struct InMemorySessionStore {
    entries: DashMap<String, Slot>,
    clock: Arc<dyn Clock>,
    next_sweep_ms: AtomicI64,
}

impl InMemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            next_sweep_ms: AtomicI64::new(clock.now().timestamp_millis() + SWEEP_INTERVAL_MS),
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of slots held, expired or not.
    pub fn capacity_used(&self) -> usize {
        self.entries.len()
    }

    fn sweep_if_due(&self, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        let due = self.next_sweep_ms.load(Ordering::Relaxed);
        if now_ms < due {
            return;
        }
        if self
            .next_sweep_ms
            .compare_exchange(due, now_ms + SWEEP_INTERVAL_MS, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.evict_at > now);
        tracing::debug!(evicted = before.saturating_sub(self.entries.len()), "swept expired sessions");
    }

    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| e.evict_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_where(&self, predicate: impl Fn(&RefreshRecord) -> bool) -> u64 {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, slot| {
            if predicate(&slot.record) {
                if slot.evict_at > now {
                    removed += 1;
                }
                false
            } else {
                true
            }
        });
        removed
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, record: &RefreshRecord, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.sweep_if_due(now);
        let slot = Slot {
            record: record.clone(),
            evict_at: now + ttl,
        };
        self.entries.insert(record.token_id.as_str().to_string(), slot);
        Ok(())
    }

    async fn get(&self, token_id: &TokenId) -> Result<Option<RefreshRecord>, StoreError> {
        let now = self.clock.now();
        match self.entries.entry(token_id.as_str().to_string()) {
            Entry::Occupied(entry) if entry.get().evict_at <= now => {
                entry.remove();
                Ok(None)
            }
            Entry::Occupied(entry) => Ok(Some(entry.get().record.clone())),
            Entry::Vacant(_) => Ok(None),
        }
    }

    async fn invalidate(&self, token_id: &TokenId) -> Result<Invalidation, StoreError> {
        let now = self.clock.now();
        let outcome = match self.entries.entry(token_id.as_str().to_string()) {
            Entry::Occupied(entry) if entry.get().evict_at <= now => {
                entry.remove();
                Invalidation::NotFound
            }
            Entry::Occupied(mut entry) => {
                let slot = entry.get_mut();
                if slot.record.used {
                    Invalidation::AlreadyUsed(slot.record.clone())
                } else {
                    let before = slot.record.clone();
                    slot.record.used = true;
                    Invalidation::Invalidated(before)
                }
            }
            Entry::Vacant(_) => Invalidation::NotFound,
        };
        Ok(outcome)
    }

    async fn delete_all_for_identity(&self, identity: Identity) -> Result<u64, StoreError> {
        Ok(self.remove_where(|record| record.identity == identity))
    }

    async fn delete_session(&self, identity: Identity, session_id: Uuid) -> Result<u64, StoreError> {
        Ok(self.remove_where(|record| {
            record.identity == identity && record.session_id == session_id
        }))
    }
}
