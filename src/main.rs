use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_relay::cache::redis::RedisTier;
use transcript_relay::cache::store::PersistentStore;
use transcript_relay::cache::CacheManager;
use transcript_relay::captions::TimedTextClient;
use transcript_relay::cli::Cli;
use transcript_relay::config::Config;
use transcript_relay::fetch::FetchOrchestrator;
use transcript_relay::media::YtDlpLocator;
use transcript_relay::server::{self, AppState};
use transcript_relay::stt::{DeepgramClient, SpeechToText};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "transcript_relay=debug"
    } else {
        "transcript_relay=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    let redis = match &config.tiers.redis_url {
        Some(url) => match RedisTier::connect(url).await {
            Ok(tier) => {
                tracing::info!("redis tier connected");
                Some(tier)
            }
            Err(error) => {
                tracing::warn!(%error, "redis tier unavailable, continuing without it");
                None
            }
        },
        None => None,
    };

    let store = match (&config.tiers.supabase_url, &config.tiers.supabase_service_key) {
        (Some(url), Some(key)) => {
            tracing::info!("persistent tier configured");
            Some(PersistentStore::new(url, key)?)
        }
        _ => None,
    };

    let cache = Arc::new(
        CacheManager::new(config.cache_ttl(), config.cache.max_entries)
            .with_redis(redis)
            .with_store(store),
    );

    let captions = TimedTextClient::new(config.proxy.as_ref())?;
    let stt: Option<Box<dyn SpeechToText>> = match &config.stt.deepgram_api_key {
        Some(api_key) => Some(Box::new(DeepgramClient::new(api_key)?)),
        None => None,
    };
    let orchestrator = Arc::new(FetchOrchestrator::new(
        Box::new(captions),
        Box::new(YtDlpLocator::new()),
        stt,
    ));

    let state = AppState {
        cache,
        orchestrator,
        stt_default_enabled: config.stt.fallback_enabled,
    };
    let app = server::create_router(state);

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cli.bind, cli.port))?;

    tracing::info!(%addr, "Starting transcript-relay server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
