use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

pub mod text;

use crate::config::ProxyConfig;
use self::text::CaptionFormat;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_ENDPOINT: &str = "https://video.google.com/api/timedtext";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// A caption track fetched from the transcript source.
#[derive(Debug, Clone)]
pub struct Caption {
    /// Plain text, already stripped of cue metadata
    pub text: String,

    /// Language code the source reports for the track, if any
    pub language: Option<String>,
}

/// Failure modes of the caption collaborator.
#[derive(thiserror::Error, Debug)]
pub enum CaptionError {
    #[error("no caption track found: {0}")]
    NotFound(String),

    #[error("captions are disabled: {0}")]
    Disabled(String),

    #[error("caption source unavailable: {0}")]
    Unavailable(String),

    /// Rate-limit or IP block. This poisons the whole client origin, so
    /// callers must stop retrying for this request.
    #[error("caption source blocked the request: {0}")]
    Blocked(String),
}

/// Capability boundary for fetching caption text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Fetch the caption track for `video_id` in exactly `language`.
    async fn fetch_language(&self, video_id: &str, language: &str)
        -> Result<Caption, CaptionError>;

    /// Fetch whatever default track the source picks for `video_id`.
    async fn fetch_default(&self, video_id: &str) -> Result<Caption, CaptionError>;
}

/// Thin caption client over the timedtext endpoint.
///
/// Rotating-proxy credentials, when configured, route every request through
/// the proxy so upstream IP blocks can be sidestepped.
pub struct TimedTextClient {
    client: reqwest::Client,
    endpoint: String,
}

impl TimedTextClient {
    pub fn new(proxy: Option<&ProxyConfig>) -> crate::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(DEFAULT_USER_AGENT);

        if let Some(proxy) = proxy {
            let upstream = reqwest::Proxy::all(proxy.endpoint.as_str())?
                .basic_auth(&proxy.username, &proxy.password);
            builder = builder.proxy(upstream);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    async fn fetch_track(
        &self,
        video_id: &str,
        language: Option<&str>,
    ) -> Result<Caption, CaptionError> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("v", video_id), ("fmt", "vtt")]);
        if let Some(language) = language {
            request = request.query(&[("lang", language)]);
        }

        let response = request
            .send()
            .await
            .map_err(|error| CaptionError::Unavailable(error.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            return Err(CaptionError::Blocked(format!(
                "caption endpoint returned HTTP {status} for video {video_id}"
            )));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(CaptionError::NotFound(format!(
                "no caption track for video {video_id}"
            )));
        }
        if !status.is_success() {
            return Err(CaptionError::Unavailable(format!(
                "caption endpoint returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|error| CaptionError::Unavailable(error.to_string()))?;

        // The endpoint answers 200 with an empty body when the track does
        // not exist for the requested language.
        let stripped = text::to_plain_text(&body, CaptionFormat::sniff(&body));
        if stripped.is_empty() {
            return Err(CaptionError::NotFound(match language {
                Some(language) => {
                    format!("no caption track in language '{language}' for video {video_id}")
                }
                None => format!("no caption track for video {video_id}"),
            }));
        }

        Ok(Caption {
            text: stripped,
            language: language.map(str::to_string),
        })
    }
}

#[async_trait]
impl CaptionSource for TimedTextClient {
    async fn fetch_language(
        &self,
        video_id: &str,
        language: &str,
    ) -> Result<Caption, CaptionError> {
        self.fetch_track(video_id, Some(language)).await
    }

    async fn fetch_default(&self, video_id: &str) -> Result<Caption, CaptionError> {
        self.fetch_track(video_id, None).await
    }
}
