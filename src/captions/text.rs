//! Caption payload normalization: VTT and SRT bodies to plain text.

use once_cell::sync::Lazy;
use regex::Regex;

static VTT_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\AWEBVTT.*?\n\n").expect("valid regex"));
static VTT_TIMECODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}:\d{2}:\d{2}\.\d{3} --> [^\n]+\n").expect("valid regex"));
static SRT_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\d+\s*$").expect("valid regex"));
static SRT_TIMECODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{2}:\d{2}:\d{2},\d{3} --> \d{2}:\d{2}:\d{2},\d{3}\s*\n").expect("valid regex")
});
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

/// Caption container formats we know how to strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionFormat {
    Vtt,
    Srt,
    Unknown,
}

impl CaptionFormat {
    /// Guess the container from the payload itself. Sources do not always
    /// honor the requested format, so the body is the only reliable signal.
    pub fn sniff(body: &str) -> Self {
        let trimmed = body.trim_start();
        if trimmed.starts_with("WEBVTT") {
            return CaptionFormat::Vtt;
        }
        if SRT_TIMECODE.is_match(trimmed) {
            return CaptionFormat::Srt;
        }
        CaptionFormat::Unknown
    }
}

/// Reduce a caption body to plain transcript text, dropping cue headers,
/// timecodes and inline markup. Unknown formats pass through untouched.
pub fn to_plain_text(body: &str, format: CaptionFormat) -> String {
    match format {
        CaptionFormat::Vtt => strip_vtt(body),
        CaptionFormat::Srt => strip_srt(body),
        CaptionFormat::Unknown => body.trim().to_string(),
    }
}

fn strip_vtt(vtt: &str) -> String {
    let text = VTT_HEADER.replace(vtt, "");
    let text = VTT_TIMECODE.replace_all(&text, "");
    let text = MARKUP_TAG.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n");
    text.trim().to_string()
}

fn strip_srt(srt: &str) -> String {
    let text = SRT_INDEX.replace_all(srt, "");
    let text = SRT_TIMECODE.replace_all(&text, "");
    let text = MARKUP_TAG.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n");
    text.trim().to_string()
}
