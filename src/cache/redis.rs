use anyhow::Context;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::time::timeout;

use super::{CacheEntry, CacheKey};
use crate::Result;

/// Per-operation deadline; a slow Redis must degrade to a miss, not hang the
/// request.
const OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Distributed cache tier backed by Redis.
///
/// Entries are stored as JSON with a native `EX` expiry, so a read never
/// returns a value Redis considers expired. The connection manager reconnects
/// on its own and is cheap to clone.
#[derive(Clone)]
pub struct RedisTier {
    conn: ConnectionManager,
}

impl RedisTier {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis URL")?;
        let conn = timeout(OP_TIMEOUT, ConnectionManager::new(client))
            .await
            .context("redis connection timed out")?
            .context("failed to connect to redis")?;
        Ok(Self { conn })
    }

    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = timeout(OP_TIMEOUT, conn.get(key.to_string()))
            .await
            .context("redis get timed out")?
            .context("redis get failed")?;

        match raw {
            Some(raw) => {
                let entry = serde_json::from_str(&raw).context("corrupt cache entry in redis")?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    pub async fn set(&self, key: &CacheKey, entry: &CacheEntry, ttl: Duration) -> Result<()> {
        let payload = serde_json::to_string(entry).context("failed to serialize cache entry")?;
        let seconds = ttl.as_secs().max(1);

        let mut conn = self.conn.clone();
        timeout(
            OP_TIMEOUT,
            conn.set_ex::<_, _, ()>(key.to_string(), payload, seconds),
        )
        .await
        .context("redis set timed out")?
        .context("redis set failed")?;

        Ok(())
    }

    /// Connectivity probe for the stats endpoint.
    pub async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        let response = timeout(OP_TIMEOUT, async move {
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(pong)
        })
        .await;

        matches!(response, Ok(Ok(_)))
    }
}
