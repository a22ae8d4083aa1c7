// In-process TTL cache and last-good feed snapshots
use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::types::*;
use crate::FeedPayload;

/// Keyed cache that reports staleness instead of evicting.
///
/// Stale entries stay readable so a failed refresh can still serve the last
/// value.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, (V, DateTime<Utc>)>>,
    ttl: Duration,
}

/// Cached value with its age verdict
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
    pub is_stale: bool,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<Cached<V>> {
        self.get_at(key, Utc::now()).await
    }

    /// Lookup with an explicit clock
    pub async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Cached<V>> {
        let entries = self.entries.read().await;
        entries.get(key).map(|(value, stored_at)| Cached {
            value: value.clone(),
            stored_at: *stored_at,
            is_stale: now - *stored_at >= self.ttl,
        })
    }

    pub async fn put(&self, key: &str, value: V, stored_at: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value, stored_at));
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

/// Persistence of the last successfully built feed
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<FeedPayload>>;

    async fn save(&self, payload: &FeedPayload) -> Result<()>;

    fn name(&self) -> &str;
}

const SNAPSHOT_KEY: &str = "signals:feed:last_good";
/// Snapshots outlive several days of upstream outages
const SNAPSHOT_TTL_SECS: u64 = 7 * 24 * 3600;

/// Snapshot store backed by Redis
pub struct RedisSnapshotStore {
    client: redis::aio::MultiplexedConnection,
}

impl RedisSnapshotStore {
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        Ok(Self { client: conn })
    }
}

#[async_trait::async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn load(&self) -> Result<Option<FeedPayload>> {
        let value: Option<String> = self
            .client
            .clone()
            .get(SNAPSHOT_KEY)
            .await
            .map_err(|e| SignalError::CacheError(e.to_string()))?;

        match value {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| SignalError::CacheError(e.to_string())),
            None => Ok(None),
        }
    }

    async fn save(&self, payload: &FeedPayload) -> Result<()> {
        let json =
            serde_json::to_string(payload).map_err(|e| SignalError::CacheError(e.to_string()))?;

        // explicit unit annotation avoids never-type fallback
        let _: () = self
            .client
            .clone()
            .set_ex(SNAPSHOT_KEY, json, SNAPSHOT_TTL_SECS)
            .await
            .map_err(|e| SignalError::CacheError(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}

/// Process-local snapshot store, used when Redis is not configured
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: RwLock<Option<FeedPayload>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<FeedPayload>> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, payload: &FeedPayload) -> Result<()> {
        *self.slot.write().await = Some(payload.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
