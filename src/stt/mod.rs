use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Result;

const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_ENDPOINT: &str = "https://api.deepgram.com";

/// Ordered prefix to provider-language mapping; the first preference whose
/// tag starts with a known prefix wins.
const LANGUAGE_PREFIXES: &[(&str, &str)] = &[("ko", "ko"), ("en", "en")];
const DEFAULT_LANGUAGE: &str = "en";

/// A best-effort transcription of an audio stream.
#[derive(Debug, Clone)]
pub struct SpeechTranscript {
    pub text: String,

    /// Language the provider was asked to transcribe in
    pub language: String,
}

/// Capability boundary for the optional speech-to-text fallback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe the audio at `audio_url`. `None` means the provider had
    /// nothing usable; hard failures are errors for the caller to log.
    async fn transcribe(
        &self,
        audio_url: &str,
        preferred_languages: &[String],
    ) -> Result<Option<SpeechTranscript>>;
}

/// Map the caller's language preference list onto a provider language code.
pub fn select_language(preferred_languages: &[String]) -> &'static str {
    for preference in preferred_languages {
        for (prefix, code) in LANGUAGE_PREFIXES {
            if preference.starts_with(prefix) {
                return code;
            }
        }
    }
    DEFAULT_LANGUAGE
}

/// Deepgram pre-recorded transcription client.
///
/// The provider fetches the audio itself from the URL we pass, so no media
/// bytes flow through this process.
pub struct DeepgramClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ListenRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    transcript: String,
}

impl DeepgramClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(TRANSCRIBE_TIMEOUT)
            .build()
            .context("failed to build transcription client")?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl SpeechToText for DeepgramClient {
    async fn transcribe(
        &self,
        audio_url: &str,
        preferred_languages: &[String],
    ) -> Result<Option<SpeechTranscript>> {
        let language = select_language(preferred_languages);
        let url = format!(
            "{}/v1/listen?language={}&smart_format=true",
            self.endpoint, language
        );

        tracing::debug!(language, "Submitting audio for transcription");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .json(&ListenRequest { url: audio_url })
            .send()
            .await
            .context("transcription request failed")?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "transcription provider returned an error");
            return Ok(None);
        }

        let body: ListenResponse = response
            .json()
            .await
            .context("failed to parse transcription response")?;

        Ok(extract_transcript(body).map(|text| SpeechTranscript {
            text,
            language: language.to_string(),
        }))
    }
}

/// Pull the first alternative of the first channel, the provider's best
/// guess. Empty transcripts count as no result.
fn extract_transcript(body: ListenResponse) -> Option<String> {
    let transcript = body
        .results?
        .channels
        .into_iter()
        .next()?
        .alternatives
        .into_iter()
        .next()?
        .transcript;

    if transcript.trim().is_empty() {
        None
    } else {
        Some(transcript)
    }
}
