use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CacheEntry, CacheKey, TranscriptResult};
use crate::Result;

const OP_TIMEOUT: Duration = Duration::from_secs(10);
const TABLE: &str = "transcripts";

/// One row in the persistent tier, keyed by the serialized cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TranscriptRow {
    cache_key: String,
    video_id: String,
    data: TranscriptResult,
    created_at: DateTime<Utc>,
}

/// Persistent cache tier backed by a Supabase-style PostgREST endpoint.
///
/// Writes are upserts (last write wins for a key); reads filter on the key
/// column and carry the row's own `created_at` back so the manager can apply
/// its freshness check.
#[derive(Clone)]
pub struct PersistentStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl PersistentStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(OP_TIMEOUT)
            .build()
            .context("failed to build persistent store client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), TABLE),
            api_key: api_key.to_string(),
        })
    }

    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("cache_key", format!("eq.{}", key)),
                ("select", "*".to_string()),
                ("limit", "1".to_string()),
            ])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("persistent store lookup failed")?;

        if !response.status().is_success() {
            anyhow::bail!("persistent store returned HTTP {}", response.status());
        }

        let rows: Vec<TranscriptRow> = response
            .json()
            .await
            .context("failed to parse persistent store rows")?;

        Ok(rows.into_iter().next().map(|row| CacheEntry {
            payload: row.data,
            stored_at: row.created_at,
        }))
    }

    pub async fn upsert(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let row = TranscriptRow {
            cache_key: key.to_string(),
            video_id: key.video_id().to_string(),
            data: entry.payload.clone(),
            created_at: entry.stored_at,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&row)
            .send()
            .await
            .context("persistent store write failed")?;

        if !response.status().is_success() {
            anyhow::bail!("persistent store upsert returned HTTP {}", response.status());
        }

        Ok(())
    }
}
