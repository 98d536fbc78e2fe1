use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::Result;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves a directly downloadable audio stream for a video, so the
/// speech-to-text provider can fetch the media itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioLocator: Send + Sync {
    /// Best available audio-only stream URL, or `None` when the video
    /// exposes no usable audio stream. Absence is not an error.
    async fn best_audio_url(&self, video_url: &str) -> Result<Option<String>>;
}

/// Audio stream locator using yt-dlp's metadata probe (no media download).
pub struct YtDlpLocator {
    yt_dlp_path: String,
}

impl YtDlpLocator {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    /// Get format metadata for the video using yt-dlp.
    async fn probe(&self, url: &str) -> Result<Value> {
        tracing::debug!("Probing media formats for: {}", url);

        let output = timeout(
            PROBE_TIMEOUT,
            Command::new(&self.yt_dlp_path)
                .args(["--dump-json", "--no-playlist", "--skip-download", url])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await
        .context("yt-dlp probe timed out")??;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error);
        }

        let info: Value = serde_json::from_slice(&output.stdout)?;
        Ok(info)
    }
}

#[async_trait]
impl AudioLocator for YtDlpLocator {
    async fn best_audio_url(&self, video_url: &str) -> Result<Option<String>> {
        let info = self.probe(video_url).await?;
        Ok(pick_audio_url(&info))
    }
}

impl Default for YtDlpLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the highest-bitrate audio-only format that exposes a URL.
///
/// Audio-only means no video codec and a real audio codec; formats without
/// a URL are unusable regardless of bitrate.
pub fn pick_audio_url(info: &Value) -> Option<String> {
    let formats = info.get("formats")?.as_array()?;

    formats
        .iter()
        .filter(|format| {
            let vcodec = format.get("vcodec").and_then(Value::as_str).unwrap_or("none");
            let acodec = format.get("acodec").and_then(Value::as_str).unwrap_or("none");
            vcodec == "none"
                && acodec != "none"
                && format.get("url").and_then(Value::as_str).is_some()
        })
        .max_by(|a, b| {
            audio_bitrate(a)
                .partial_cmp(&audio_bitrate(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .and_then(|format| format.get("url").and_then(Value::as_str))
        .map(str::to_string)
}

fn audio_bitrate(format: &Value) -> f64 {
    format.get("abr").and_then(Value::as_f64).unwrap_or(0.0)
}
