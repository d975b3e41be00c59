//! Redis-backed remote store.

use super::RemoteStore;
use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, Runtime};
use redis::{AsyncCommands, RedisError};
use std::future::Future;
use std::time::Duration;
use strata_config::RedisConfig;
use strata_core::{StrataError, StrataResult};
use strata_resilience::with_timeout;
use tracing::{debug, info};

/// Create a Redis connection pool from configuration.
pub fn create_pool(config: &RedisConfig) -> StrataResult<Pool> {
    let pool = deadpool_redis::Config::from_url(&config.url)
        .builder()
        .map_err(|e| StrataError::Configuration(format!("Invalid Redis config: {}", e)))?
        .max_size(config.pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| StrataError::Configuration(format!("Failed to create Redis pool: {}", e)))?;

    info!(url = %config.url, pool_size = config.pool_size, "Redis connection pool created");
    Ok(pool)
}

/// Redis implementation of [`RemoteStore`].
///
/// Every command, including checking a connection out of the pool, is
/// bounded by the configured command timeout.
pub struct RedisStore {
    pool: Pool,
    command_timeout: Duration,
}

impl RedisStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: Pool, command_timeout: Duration) -> Self {
        Self {
            pool,
            command_timeout,
        }
    }

    /// Create a pool from configuration and wrap it.
    pub fn from_config(config: &RedisConfig) -> StrataResult<Self> {
        Ok(Self::new(create_pool(config)?, config.command_timeout()))
    }

    /// Run one command on a pooled connection under the command timeout.
    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> StrataResult<T>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let result = with_timeout(self.command_timeout, || async {
            let conn = self.pool.get().await?;
            Ok(f(conn).await?)
        })
        .await;

        if let Err(e) = &result {
            debug!(op, error = %e, "Redis command failed");
        }
        result
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> StrataResult<Option<String>> {
        self.run("GET", |mut conn| async move {
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn get_with_ttl(&self, key: &str) -> StrataResult<Option<(String, Option<Duration>)>> {
        let (value, remaining): (Option<String>, i64) = self
            .run("GET+PTTL", |mut conn| async move {
                redis::pipe()
                    .get(key)
                    .cmd("PTTL")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        // PTTL: -2 no such key, -1 no expiry
        Ok(value.map(|value| (value, u64::try_from(remaining).ok().map(Duration::from_millis))))
    }

    async fn mget(&self, keys: &[String]) -> StrataResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        self.run("MGET", |mut conn| async move {
            // Explicit MGET: a single-key slice must still return an array.
            let values: Vec<Option<String>> =
                redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
            Ok(values)
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<()> {
        self.run("PSETEX", |mut conn| async move {
            conn.pset_ex::<_, _, ()>(key, value, millis(ttl)).await
        })
        .await
    }

    async fn mset_ex(&self, entries: &[(String, String)], ttl: Duration) -> StrataResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        self.run("PIPELINE PSETEX", |mut conn| async move {
            let mut pipe = redis::pipe();
            for (key, value) in entries {
                pipe.pset_ex(key, value, millis(ttl)).ignore();
            }
            pipe.query_async::<()>(&mut conn).await
        })
        .await
    }

    async fn del(&self, keys: &[String]) -> StrataResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: i64 = self
            .run("DEL", |mut conn| async move { conn.del(keys).await })
            .await?;
        Ok(u64::try_from(deleted).unwrap_or(0))
    }

    async fn keys(&self, pattern: &str) -> StrataResult<Vec<String>> {
        self.run("KEYS", |mut conn| async move {
            let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
            Ok(keys)
        })
        .await
    }

    async fn sadd(&self, key: &str, member: &str) -> StrataResult<()> {
        self.run("SADD", |mut conn| async move {
            conn.sadd::<_, _, ()>(key, member).await
        })
        .await
    }

    async fn smembers(&self, key: &str) -> StrataResult<Vec<String>> {
        self.run("SMEMBERS", |mut conn| async move {
            let members: Vec<String> = conn.smembers(key).await?;
            Ok(members)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StrataResult<()> {
        let ms = i64::try_from(millis(ttl)).unwrap_or(i64::MAX);
        self.run("PEXPIRE", |mut conn| async move {
            conn.pexpire::<_, ()>(key, ms).await
        })
        .await
    }

    async fn ping(&self) -> StrataResult<()> {
        let _: String = self
            .run("PING", |mut conn| async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;
        Ok(())
    }

    async fn flush_db(&self) -> StrataResult<()> {
        self.run("FLUSHDB", |mut conn| async move {
            redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await
        })
        .await
    }

    async fn close(&self) {
        self.pool.close();
        info!("Redis connection pool closed");
    }
}
