/// Default language preference chain when the caller specifies none.
pub const DEFAULT_LANGUAGES: &str = "ko,en";

/// Extract a video id from the common URL shapes, falling back to treating
/// the whole input as an id when nothing matches.
pub fn extract_video_id(input: &str) -> String {
    let id = if let Some((_, rest)) = input.split_once("watch?v=") {
        rest.split('&').next()
    } else if let Some((_, rest)) = input.split_once("youtu.be/") {
        rest.split('?').next()
    } else if let Some((_, rest)) = input.split_once("/shorts/") {
        rest.split('?').next()
    } else if let Some((_, rest)) = input.split_once("/embed/") {
        rest.split('?').next()
    } else {
        None
    };

    match id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => input.to_string(),
    }
}

/// Parse a comma-separated language preference list, lowercased and with
/// empty segments dropped. A missing or blank parameter gets the default
/// chain; an explicit list that parses to nothing stays empty.
pub fn parse_language_preferences(raw: Option<&str>) -> Vec<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(DEFAULT_LANGUAGES);

    raw.to_lowercase()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Toggle values accepted by query parameters and environment flags.
pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}
