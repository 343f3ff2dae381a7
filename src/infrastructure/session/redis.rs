use crate::domain::auth::{Identity, Invalidation, RefreshRecord, SessionStore, StoreError, TokenId};
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, Script};
use std::collections::HashMap;
use uuid::Uuid;

/// Flips `used` only if the record exists and is unused. Returns the status
/// ("0" missing, "1" flipped, "2" already used) followed by the record's fields as they
/// were before the call.
const INVALIDATE_SCRIPT: &str = r#"
local fields = redis.call('HGETALL', KEYS[1])
if #fields == 0 then
  return {'0'}
end
local status = '2'
if redis.call('HSETNX', KEYS[1], 'used', '1') == 1 then
  status = '1'
end
local out = {status}
for i = 1, #fields do
  out[#out + 1] = fields[i]
end
return out
"#;

/// Deletes the identity's records, optionally only those of one session (ARGV[1]).
const DELETE_SCRIPT: &str = r#"
local removed = 0
local members = redis.call('SMEMBERS', KEYS[1])
for _, token_id in ipairs(members) do
  local key = ARGV[2] .. token_id
  if ARGV[1] == '' or redis.call('HGET', key, 'session_id') == ARGV[1] then
    removed = removed + redis.call('DEL', key)
    redis.call('SREM', KEYS[1], token_id)
  end
end
return removed
"#;

/// Refresh records as Redis hashes with native key expiry.
///
/// Layout: `{prefix}:rt:{token_id}` holds the record, `{prefix}:identity:{id}` is a set of
/// the identity's token ids so bulk revocation does not need a key scan. The `used` field
/// is absent until the record is invalidated.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
    invalidate: Script,
    delete: Script,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionStore {
            conn,
            prefix: prefix.into(),
            invalidate: Script::new(INVALIDATE_SCRIPT),
            delete: Script::new(DELETE_SCRIPT),
        }
    }

    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(backend)?;
        Ok(Self::new(conn, prefix))
    }

    fn record_prefix(&self) -> String {
        format!("{}:rt:", self.prefix)
    }

    fn record_key(&self, token_id: &TokenId) -> String {
        format!("{}{}", self.record_prefix(), token_id)
    }

    fn identity_key(&self, identity: Identity) -> String {
        format!("{}:identity:{}", self.prefix, identity)
    }

    async fn delete_matching(&self, identity: Identity, session: Option<Uuid>) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let session = session.map(|s| s.to_string()).unwrap_or_default();
        let removed: u64 = self
            .delete
            .key(self.identity_key(identity))
            .arg(session)
            .arg(self.record_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(removed)
    }
}

fn backend(err: RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn encode_fields(record: &RefreshRecord) -> Vec<(&'static str, String)> {
    vec![
        ("identity", record.identity.to_string()),
        ("session_id", record.session_id.to_string()),
        ("issued_at", record.issued_at.timestamp_millis().to_string()),
        ("expires_at", record.expires_at.timestamp_millis().to_string()),
    ]
}

fn decode_record(token_id: &TokenId, fields: &HashMap<String, String>) -> Result<RefreshRecord, StoreError> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| StoreError::Backend(format!("refresh record missing '{}'", name)))
    };
    let corrupt = |name: &str| StoreError::Backend(format!("refresh record has corrupt '{}'", name));
    let timestamp = |name: &str| -> Result<DateTime<Utc>, StoreError> {
        field(name)?
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| corrupt(name))
    };

    Ok(RefreshRecord {
        token_id: token_id.clone(),
        identity: field("identity")?.parse().map_err(|_| corrupt("identity"))?,
        session_id: field("session_id")?.parse().map_err(|_| corrupt("session_id"))?,
        issued_at: timestamp("issued_at")?,
        expires_at: timestamp("expires_at")?,
        used: fields.get("used").is_some_and(|v| v == "1"),
    })
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, record: &RefreshRecord, ttl: Duration) -> Result<(), StoreError> {
        let key = self.record_key(&record.token_id);
        let index = self.identity_key(record.identity);
        let ttl_ms = ttl.num_milliseconds().max(1);
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(&key, &encode_fields(record)[..])
            .ignore()
            .pexpire(&key, ttl_ms)
            .ignore()
            .sadd(&index, record.token_id.as_str())
            .ignore()
            .pexpire(&index, ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, token_id: &TokenId) -> Result<Option<RefreshRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.record_key(token_id))
            .await
            .map_err(backend)?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_record(token_id, &fields).map(Some)
    }

    async fn invalidate(&self, token_id: &TokenId) -> Result<Invalidation, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Vec<String> = self
            .invalidate
            .key(self.record_key(token_id))
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;

        let Some((status, flat)) = reply.split_first() else {
            return Err(StoreError::Backend("empty invalidate reply".to_string()));
        };
        if status == "0" {
            return Ok(Invalidation::NotFound);
        }

        let fields: HashMap<String, String> = flat
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        let record = decode_record(token_id, &fields)?;

        match status.as_str() {
            "1" => Ok(Invalidation::Invalidated(record)),
            _ => Ok(Invalidation::AlreadyUsed(record)),
        }
    }

    async fn delete_all_for_identity(&self, identity: Identity) -> Result<u64, StoreError> {
        self.delete_matching(identity, None).await
    }

    async fn delete_session(&self, identity: Identity, session_id: Uuid) -> Result<u64, StoreError> {
        self.delete_matching(identity, Some(session_id)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
