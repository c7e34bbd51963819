use crate::error::Result;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Shared Redis tier. `None` keeps entries in process.
    pub redis_url: Option<String>,
    pub ttl: Duration,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl: Duration::from_secs(60),
            max_capacity: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            ttl: std::env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            max_capacity: std::env::var("CACHE_MAX_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_capacity),
        }
    }
}

#[derive(Clone)]
enum Backend {
    Local(moka::future::Cache<String, String>),
    Redis(ConnectionManager),
}

/// Advisory key/value cache holding JSON values, either in process or in
/// Redis. Every entry expires after the configured TTL.
#[derive(Clone)]
pub struct Cache {
    backend: Backend,
    ttl: Duration,
}

impl Cache {
    pub async fn new(config: CacheConfig) -> Result<Self> {
        match config.redis_url.clone() {
            Some(url) => {
                let client = Client::open(url)?;
                let manager = ConnectionManager::new(client).await?;
                tracing::info!("Cache using Redis");
                Ok(Self {
                    backend: Backend::Redis(manager),
                    ttl: config.ttl,
                })
            }
            None => Ok(Self::local(&config)),
        }
    }

    /// In-process cache only.
    pub fn local(config: &CacheConfig) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();

        Self {
            backend: Backend::Local(cache),
            ttl: config.ttl,
        }
    }

    /// Set a value, expiring after the configured TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized = serde_json::to_string(value)?;

        match &self.backend {
            Backend::Local(cache) => cache.insert(key.to_string(), serialized).await,
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                conn.set_ex::<_, _, ()>(key, serialized, self.ttl.as_secs().max(1))
                    .await?;
            }
        }

        Ok(())
    }

    /// Get a value from the cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value: Option<String> = match &self.backend {
            Backend::Local(cache) => cache.get(key).await,
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                conn.get(key).await?
            }
        };

        match value {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Delete a key from the cache
    pub async fn delete(&self, key: &str) -> Result<()> {
        match &self.backend {
            Backend::Local(cache) => cache.invalidate(key).await,
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                conn.del::<_, ()>(key).await?;
            }
        }
        Ok(())
    }

    /// Delete every key starting with `prefix`
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        match &self.backend {
            Backend::Local(cache) => {
                let keys: Vec<String> = cache
                    .iter()
                    .filter(|(key, _)| key.starts_with(prefix))
                    .map(|(key, _)| key.as_ref().clone())
                    .collect();

                for key in &keys {
                    cache.invalidate(key).await;
                }
                Ok(keys.len() as u64)
            }
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let keys: Vec<String> = conn.keys(format!("{}*", prefix)).await?;

                if keys.is_empty() {
                    return Ok(0);
                }

                let count = keys.len() as u64;
                conn.del::<_, ()>(keys).await?;
                Ok(count)
            }
        }
    }

    /// Ping the backing store
    pub async fn ping(&self) -> Result<()> {
        if let Backend::Redis(manager) = &self.backend {
            let mut conn = manager.clone();
            redis::cmd("PING").query_async::<()>(&mut conn).await?;
        }
        Ok(())
    }
}

pub fn membership_cache_key(workspace_id: &str, user_id: &str) -> String {
    format!("membership:{}:{}", workspace_id, user_id)
}

pub fn workspace_cache_prefix(workspace_id: &str) -> String {
    format!("membership:{}:", workspace_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Cache {
        Cache::local(&CacheConfig::default())
    }

    #[tokio::test]
    async fn test_local_set_get_delete() {
        let cache = local();

        cache.set("k", &vec![1u8, 2, 3]).await.unwrap();
        let value: Option<Vec<u8>> = cache.get("k").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));

        cache.delete("k").await.unwrap();
        let value: Option<Vec<u8>> = cache.get("k").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_local_delete_prefix() {
        let cache = local();
        cache.set(&membership_cache_key("w1", "u1"), &1).await.unwrap();
        cache.set(&membership_cache_key("w1", "u2"), &2).await.unwrap();
        cache.set(&membership_cache_key("w2", "u1"), &3).await.unwrap();

        let removed = cache.delete_prefix(&workspace_cache_prefix("w1")).await.unwrap();
        assert_eq!(removed, 2);

        let kept: Option<i32> = cache.get(&membership_cache_key("w2", "u1")).await.unwrap();
        assert_eq!(kept, Some(3));
        let gone: Option<i32> = cache.get(&membership_cache_key("w1", "u2")).await.unwrap();
        assert_eq!(gone, None);
    }

    #[tokio::test]
    async fn test_local_entries_expire() {
        let cache = Cache::local(&CacheConfig {
            ttl: Duration::from_millis(50),
            ..Default::default()
        });
        cache.set("k", &"v").await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        let value: Option<String> = cache.get("k").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    #[ignore] // Only run with Redis available
    async fn test_redis_connection() {
        let config = CacheConfig {
            redis_url: Some("redis://localhost:6379".to_string()),
            ..CacheConfig::from_env()
        };
        let cache = Cache::new(config).await.expect("Failed to connect to Redis");
        cache.ping().await.expect("Failed to ping Redis");
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_set_get() {
        let config = CacheConfig {
            redis_url: Some("redis://localhost:6379".to_string()),
            ..CacheConfig::from_env()
        };
        let cache = Cache::new(config).await.unwrap();

        cache.set("test_key", &"test_value").await.unwrap();
        let value: Option<String> = cache.get("test_key").await.unwrap();

        assert_eq!(value, Some("test_value".to_string()));
        cache.delete("test_key").await.unwrap();
    }
}
