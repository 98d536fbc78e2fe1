use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::utils;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cache tuning
    #[serde(default)]
    pub cache: CacheConfig,

    /// Speech-to-text fallback settings
    #[serde(default)]
    pub stt: SttConfig,

    /// Backing tier connections
    #[serde(default)]
    pub tiers: TierConfig,

    /// Rotating proxy credentials for the caption source
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Logical TTL applied across all tiers, in seconds
    pub ttl_secs: u64,

    /// Maximum entries held by the in-process tier
    pub max_entries: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SttConfig {
    /// Run the speech-to-text fallback even when the caller does not ask
    pub fallback_enabled: bool,

    /// Deepgram API key; without it the fallback is unavailable
    pub deepgram_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierConfig {
    /// Redis connection string, e.g. redis://localhost:6379
    pub redis_url: Option<String>,

    /// Base URL of the Supabase project backing the persistent tier
    pub supabase_url: Option<String>,

    /// Service-role key for the persistent tier
    pub supabase_service_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy gateway; the default points at Webshare's rotating endpoint
    pub endpoint: String,

    pub username: String,
    pub password: String,
}

impl ProxyConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "http://p.webshare.io:80";
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            max_entries: 500,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            stt: SttConfig::default(),
            tiers: TierConfig::default(),
            proxy: None,
        }
    }
}

impl Config {
    /// Load configuration: an optional local `config.yaml`, then environment
    /// overrides on top.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_yaml::from_str(&content).context("Failed to parse config file")?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        local_config.exists().then_some(local_config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(ttl) = env_parsed::<u64>("TRANSCRIPT_CACHE_TTL_SEC") {
            self.cache.ttl_secs = ttl;
        }
        if let Some(size) = env_parsed::<usize>("TRANSCRIPT_CACHE_SIZE") {
            self.cache.max_entries = size;
        }
        if let Some(flag) = env_var("STT_FALLBACK_ENABLED") {
            self.stt.fallback_enabled = utils::is_truthy(&flag);
        }
        if let Some(key) = env_var("DEEPGRAM_API_KEY") {
            self.stt.deepgram_api_key = Some(key);
        }
        if let Some(url) = env_var("REDIS_URL") {
            self.tiers.redis_url = Some(url);
        }
        if let Some(url) = env_var("SUPABASE_URL") {
            self.tiers.supabase_url = Some(url);
        }
        if let Some(key) = env_var("SUPABASE_SERVICE_KEY") {
            self.tiers.supabase_service_key = Some(key);
        }

        let proxy_username = env_var("WEBSHARE_PROXY_USERNAME");
        let proxy_password = env_var("WEBSHARE_PROXY_PASSWORD");
        if let (Some(username), Some(password)) = (proxy_username, proxy_password) {
            self.proxy = Some(ProxyConfig {
                endpoint: self
                    .proxy
                    .as_ref()
                    .map(|p| p.endpoint.clone())
                    .unwrap_or_else(|| ProxyConfig::DEFAULT_ENDPOINT.to_string()),
                username,
                password,
            });
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be at least 1");
        }

        if self.tiers.supabase_url.is_some() != self.tiers.supabase_service_key.is_some() {
            anyhow::bail!("persistent tier needs both a URL and a service key");
        }

        if let Some(url) = &self.tiers.supabase_url {
            Url::parse(url).context("invalid persistent tier URL")?;
        }
        if let Some(proxy) = &self.proxy {
            Url::parse(&proxy.endpoint).context("invalid proxy endpoint")?;
        }

        if self.stt.fallback_enabled && self.stt.deepgram_api_key.is_none() {
            tracing::warn!(
                "speech-to-text fallback is enabled but DEEPGRAM_API_KEY is unset; it will never produce text"
            );
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache.ttl_secs)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.cache.max_entries, 500);
        assert!(!config.stt.fallback_enabled);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn validate_rejects_half_configured_persistent_tier() {
        let mut config = Config::default();
        config.tiers.supabase_url = Some("https://project.supabase.co".to_string());
        assert!(config.validate().is_err());

        config.tiers.supabase_service_key = Some("service-key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let raw = "cache:\n  ttl_secs: 60\n  max_entries: 10\nstt:\n  fallback_enabled: true\n  deepgram_api_key: key\ntiers:\n  redis_url: redis://localhost:6379\nproxy:\n  endpoint: http://p.webshare.io:80\n  username: user\n  password: pass\n";
        let config: Config = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.stt.fallback_enabled);
        assert_eq!(
            config.tiers.redis_url.as_deref(),
            Some("redis://localhost:6379")
        );
        assert_eq!(config.proxy.unwrap().username, "user");
    }
}
