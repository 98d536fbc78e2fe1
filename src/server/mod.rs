use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache::{CacheKey, CacheManager, TranscriptResult, TranscriptSource};
use crate::fetch::FetchOrchestrator;
use crate::utils;
use crate::FetchError;

/// Shared handles for the request handlers. Cheap to clone; the cache and
/// orchestrator are constructed once per process.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub orchestrator: Arc<FetchOrchestrator>,
    /// Whether the speech-to-text fallback runs without the caller asking
    pub stt_default_enabled: bool,
}

/// Build the service router. CORS is wide open so browser frontends can
/// call the API directly.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(get_transcript))
        .route("/transcript", get(get_transcript))
        .route("/api/transcript", get(get_transcript))
        .route("/health", get(health))
        .route("/api/transcript/health", get(health))
        .route("/cache/stats", get(cache_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
    url: Option<String>,
    lang: Option<String>,
    stt: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranscriptResponse {
    text: String,
    lang: Option<String>,
    ext: TranscriptSource,
    cached: bool,
}

impl From<TranscriptResult> for TranscriptResponse {
    fn from(result: TranscriptResult) -> Self {
        Self {
            text: result.text,
            lang: result.language,
            ext: result.source,
            cached: result.cached,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Errors as callers see them: a stable `error` code plus a human-readable
/// `detail`, with the HTTP status carrying the category.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("url query required")]
    MissingUrl,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MissingUrl => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "url query required".to_string(),
                    detail: None,
                },
            ),
            ApiError::Fetch(FetchError::NoTranscript(detail)) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "no_transcript_or_stt".to_string(),
                    detail: Some(detail),
                },
            ),
            ApiError::Fetch(FetchError::Blocked(detail)) => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    error: "ip_blocked".to_string(),
                    detail: Some(format!(
                        "{detail}. Configure rotating proxy credentials to avoid IP blocks."
                    )),
                },
            ),
            ApiError::Fetch(FetchError::SourceUnavailable(detail)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "unexpected_error".to_string(),
                    detail: Some(detail),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

async fn get_transcript(
    State(state): State<AppState>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let url = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(ApiError::MissingUrl)?;

    let languages = utils::parse_language_preferences(query.lang.as_deref());
    let stt_allowed = state.stt_default_enabled
        || query.stt.as_deref().map(utils::is_truthy).unwrap_or(false);

    let video_id = utils::extract_video_id(url);
    let key = CacheKey::new(&video_id, &languages);

    if let Some(result) = state.cache.get(&key).await {
        tracing::debug!(key = %key, "serving transcript from cache");
        return Ok(Json(result.into()));
    }

    let result = state
        .orchestrator
        .resolve(&video_id, url, &languages, stt_allowed)
        .await?;

    state.cache.set(&key, result.clone()).await;
    Ok(Json(result.into()))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    hits: u64,
    misses: u64,
    total: u64,
    hit_rate: f64,
    memory_cache_size: usize,
    redis_connected: bool,
    store_configured: bool,
}

async fn cache_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();
    let redis_connected = match state.cache.redis() {
        Some(redis) => redis.ping().await,
        None => false,
    };

    Json(StatsResponse {
        hits: stats.hits,
        misses: stats.misses,
        total: stats.total,
        hit_rate: stats.hit_rate,
        memory_cache_size: stats.memory_cache_size,
        redis_connected,
        store_configured: state.cache.has_store(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::{Caption, CaptionError, MockCaptionSource};
    use crate::media::MockAudioLocator;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with_captions(captions: MockCaptionSource) -> Router {
        let orchestrator = FetchOrchestrator::new(
            Box::new(captions),
            Box::new(MockAudioLocator::new()),
            None,
        );
        create_router(AppState {
            cache: Arc::new(CacheManager::new(Duration::from_secs(3600), 16)),
            orchestrator: Arc::new(orchestrator),
            stt_default_enabled: false,
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = app_with_captions(MockCaptionSource::new());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_url_is_a_400() {
        let app = app_with_captions(MockCaptionSource::new());
        let response = app
            .oneshot(Request::get("/transcript").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "url query required");
    }

    #[tokio::test]
    async fn transcript_is_served_and_then_cached() {
        let mut captions = MockCaptionSource::new();
        // Exactly one upstream fetch: the second request must hit the cache.
        captions
            .expect_fetch_language()
            .times(1)
            .returning(|_, _| {
                Ok(Caption {
                    text: "hello from captions".to_string(),
                    language: Some("ko".to_string()),
                })
            });

        let app = app_with_captions(captions);
        let uri = "/transcript?url=https://youtu.be/abc123&lang=ko";

        let first = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let body = body_json(first).await;
        assert_eq!(body["text"], "hello from captions");
        assert_eq!(body["lang"], "ko");
        assert_eq!(body["ext"], "transcript");
        assert_eq!(body["cached"], false);

        let second = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        let body = body_json(second).await;
        assert_eq!(body["cached"], true);
    }

    #[tokio::test]
    async fn no_transcript_maps_to_404() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_fetch_language()
            .returning(|_, _| Err(CaptionError::NotFound("nothing here".to_string())));
        captions
            .expect_fetch_default()
            .returning(|_| Err(CaptionError::NotFound("nothing here".to_string())));

        let app = app_with_captions(captions);
        let response = app
            .oneshot(
                Request::get("/transcript?url=abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "no_transcript_or_stt");
        assert_eq!(body["detail"], "nothing here");
    }

    #[tokio::test]
    async fn blocked_maps_to_429() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_fetch_language()
            .times(1)
            .returning(|_, _| Err(CaptionError::Blocked("origin blocked".to_string())));

        let app = app_with_captions(captions);
        let response = app
            .oneshot(
                Request::get("/transcript?url=abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"], "ip_blocked");
    }

    #[tokio::test]
    async fn stats_reports_counters_and_tier_flags() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_fetch_language()
            .returning(|_, _| Err(CaptionError::NotFound("nope".to_string())));
        captions
            .expect_fetch_default()
            .returning(|_| Err(CaptionError::NotFound("nope".to_string())));

        let app = app_with_captions(captions);
        app.clone()
            .oneshot(
                Request::get("/transcript?url=abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/cache/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["hits"], 0);
        assert_eq!(body["misses"], 1);
        assert_eq!(body["total"], 1);
        assert_eq!(body["redis_connected"], false);
        assert_eq!(body["store_configured"], false);
    }
}
