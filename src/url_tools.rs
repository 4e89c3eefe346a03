//! URL validation and video id extraction

use regex::Regex;
use std::sync::LazyLock;

/// Returned by [`extract_video_id`] when the URL has no recognizable id
pub const UNKNOWN_VIDEO_ID: &str = "demo_video";

// Path form (/embed/ID, /v/ID, /<a>/<b>/ID), query form (watch?v=ID) and youtu.be short links
static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .unwrap_or_else(|e| unreachable!("video id pattern is a valid regex: {e}"))
});

/// Check whether `input` is a well-formed absolute URL
///
/// Leading and trailing whitespace is ignored. The URL must carry a scheme and
/// an authority; `mailto:` style URLs without a host are rejected.
///
/// # Examples
///
/// ```
/// use videomax_client::url_tools::is_valid_url;
///
/// assert!(is_valid_url("  https://youtu.be/dQw4w9WgXcQ "));
/// assert!(!is_valid_url("youtu.be/dQw4w9WgXcQ"));
/// assert!(!is_valid_url(""));
/// ```
#[must_use]
pub fn is_valid_url(input: &str) -> bool {
    match url::Url::parse(input.trim()) {
        Ok(parsed) => parsed.has_host(),
        Err(_) => false,
    }
}

/// Extract an 11-character video id from a video-sharing URL
///
/// Never fails: returns [`UNKNOWN_VIDEO_ID`] when no id can be found.
///
/// # Examples
///
/// ```
/// use videomax_client::url_tools::extract_video_id;
///
/// assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ"), "dQw4w9WgXcQ");
/// assert_eq!(extract_video_id("https://vimeo.com/123"), "demo_video");
/// ```
#[must_use]
pub fn extract_video_id(url: &str) -> String {
    VIDEO_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_VIDEO_ID.to_string())
}

/// Conventional thumbnail URL for a video id
#[must_use]
pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
}
