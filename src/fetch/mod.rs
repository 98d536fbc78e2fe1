use crate::cache::{TranscriptResult, TranscriptSource};
use crate::captions::{Caption, CaptionError, CaptionSource};
use crate::media::AudioLocator;
use crate::stt::SpeechToText;
use crate::FetchError;

/// Produces a transcript when the cache has nothing, walking a layered
/// fallback chain: per-language caption fetch, then an unrestricted caption
/// fetch, then optional speech-to-text recovery.
///
/// A `Blocked` failure from the caption source aborts the whole resolution
/// immediately. The block applies to this client's network origin, not to a
/// single language, and further attempts would only deepen it.
pub struct FetchOrchestrator {
    captions: Box<dyn CaptionSource>,
    audio: Box<dyn AudioLocator>,
    stt: Option<Box<dyn SpeechToText>>,
}

impl FetchOrchestrator {
    pub fn new(
        captions: Box<dyn CaptionSource>,
        audio: Box<dyn AudioLocator>,
        stt: Option<Box<dyn SpeechToText>>,
    ) -> Self {
        Self {
            captions,
            audio,
            stt,
        }
    }

    /// Resolve a transcript for `video_id`, trying `preferred_languages` in
    /// order. `source_url` is the original video URL, needed when the
    /// speech-to-text path has to locate an audio stream.
    pub async fn resolve(
        &self,
        video_id: &str,
        source_url: &str,
        preferred_languages: &[String],
        stt_allowed: bool,
    ) -> Result<TranscriptResult, FetchError> {
        let mut last_failure: Option<String> = None;

        for language in preferred_languages {
            match self.captions.fetch_language(video_id, language).await {
                Ok(caption) if !caption.text.trim().is_empty() => {
                    tracing::info!(video_id, %language, "caption track fetched");
                    return Ok(caption_result(caption, Some(language)));
                }
                Ok(_) => {
                    last_failure = Some(format!("empty caption track for language '{language}'"));
                }
                Err(CaptionError::Blocked(detail)) => {
                    tracing::warn!(video_id, "caption source blocked the request");
                    return Err(FetchError::Blocked(detail));
                }
                Err(error) => {
                    tracing::debug!(video_id, %language, %error, "caption attempt failed");
                    last_failure = Some(error.to_string());
                }
            }
        }

        // Unrestricted attempt: let the source pick its default track.
        match self.captions.fetch_default(video_id).await {
            Ok(caption) if !caption.text.trim().is_empty() => {
                tracing::info!(video_id, "default caption track fetched");
                return Ok(caption_result(caption, None));
            }
            Ok(_) => {
                last_failure = Some("empty default caption track".to_string());
            }
            Err(CaptionError::Blocked(detail)) => {
                tracing::warn!(video_id, "caption source blocked the request");
                return Err(FetchError::Blocked(detail));
            }
            Err(error) => {
                tracing::debug!(video_id, %error, "default caption attempt failed");
                last_failure = Some(error.to_string());
            }
        }

        if stt_allowed {
            if let Some(result) = self
                .recover_with_stt(video_id, source_url, preferred_languages)
                .await
            {
                return Ok(result);
            }
        }

        Err(FetchError::NoTranscript(
            last_failure.unwrap_or_else(|| "empty".to_string()),
        ))
    }

    /// Speech-to-text recovery. Every failure along this path means "no
    /// result", never an error: the captions diagnostic is the one callers
    /// should see.
    async fn recover_with_stt(
        &self,
        video_id: &str,
        source_url: &str,
        preferred_languages: &[String],
    ) -> Option<TranscriptResult> {
        let stt = self.stt.as_ref()?;

        let audio_url = match self.audio.best_audio_url(source_url).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                tracing::debug!(video_id, "no audio-only stream available");
                return None;
            }
            Err(error) => {
                tracing::warn!(video_id, %error, "audio stream resolution failed");
                return None;
            }
        };

        match stt.transcribe(&audio_url, preferred_languages).await {
            Ok(Some(transcript)) if !transcript.text.trim().is_empty() => {
                tracing::info!(video_id, language = %transcript.language, "speech-to-text recovery succeeded");
                Some(TranscriptResult {
                    text: transcript.text,
                    language: Some(transcript.language),
                    source: TranscriptSource::SpeechToText,
                    cached: false,
                })
            }
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(video_id, %error, "speech-to-text fallback failed");
                None
            }
        }
    }
}

fn caption_result(caption: Caption, requested_language: Option<&String>) -> TranscriptResult {
    TranscriptResult {
        language: caption
            .language
            .or_else(|| requested_language.cloned()),
        text: caption.text,
        source: TranscriptSource::Captions,
        cached: false,
    }
}
