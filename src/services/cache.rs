//! Entity cache: Redis, in-process or disabled
//!
//! Services own every key and decide when entries are replaced or evicted.
//! A failing backend never fails a request: errors are logged and the
//! lookup falls through to the repository.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

/// Key/value store holding serialized entities
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    async fn put(&self, key: &str, value: String) -> AppResult<()>;
    async fn evict(&self, key: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
    ttl_seconds: u64,
}

impl RedisCache {
    /// Create a new Redis cache and check the connection
    pub async fn new(url: &str, ttl_seconds: u64) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { client, ttl_seconds })
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read {} from Redis: {}", key, e)))
    }

    async fn put(&self, key: &str, value: String) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, self.ttl_seconds)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write {} to Redis: {}", key, e)))
    }

    async fn evict(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to evict {} from Redis: {}", key, e)))
    }
}

/// In-process cache with the same expiry semantics as Redis
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn put(&self, key: &str, value: String) -> AppResult<()> {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn evict(&self, key: &str) -> AppResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Caching disabled
pub struct NoopCache;

#[async_trait]
impl CacheStore for NoopCache {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: String) -> AppResult<()> {
        Ok(())
    }

    async fn evict(&self, _key: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Typed view over a `CacheStore`, scoped to one key prefix ("books", "users", ...)
#[derive(Clone)]
pub struct EntityCache {
    store: Arc<dyn CacheStore>,
    prefix: &'static str,
}

impl EntityCache {
    pub fn new(store: Arc<dyn CacheStore>, prefix: &'static str) -> Self {
        Self { store, prefix }
    }

    pub fn key(&self, field: &str, value: impl std::fmt::Display) -> String {
        format!("{}:{}:{}", self.prefix, field, value)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!("Cache hit for {}", key);
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.put(key, raw).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }

    pub async fn evict(&self, key: &str) {
        if let Err(e) = self.store.evict(key).await {
            tracing::warn!("Cache eviction failed for {}: {}", key, e);
        }
    }
}
