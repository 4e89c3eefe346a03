//! Metadata resolution with provider fallback
//!
//! Resolution tries the primary extractor first and the alternative provider
//! second. The two tiers fail differently:
//!
//! - Primary answered but unusably (error status, `success` falsy, empty
//!   format lists): the alternative provider's outcome is returned as is.
//! - Primary failed outright (transport, undecodable body): the alternative
//!   provider is tried; if it also fails, the *primary* error decides the
//!   result and the fallback error is dropped.

use crate::client::{BackendClient, FallbackReply};
use crate::error::{Error, Result};
use crate::types::{FormatDescriptor, FormatSet, VideoMetadata};
use crate::url_tools::{extract_video_id, thumbnail_url};
use std::sync::Arc;

/// Id given to records synthesized from the alternative provider
pub const FALLBACK_VIDEO_ID: &str = "cobalt_provider";

/// Message used when neither provider produced usable data
pub const UNPROCESSABLE_MESSAGE: &str = "could not process video";

/// Resolves a video URL into [`VideoMetadata`]
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    client: Arc<BackendClient>,
}

impl MetadataResolver {
    /// Create a resolver backed by `client`
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }

    /// Resolve metadata for `url`, falling back to the alternative provider
    ///
    /// Returns a fully populated record, or fails with
    /// [`Error::BackendUnreachable`], [`Error::ResolutionFailed`], or the
    /// primary tier's own error when it failed for a non-transport reason.
    pub async fn resolve(&self, url: &str) -> Result<VideoMetadata> {
        match self.primary(url).await {
            Ok(Some(metadata)) => {
                tracing::info!(url = %url, title = %metadata.title, "resolved video metadata");
                Ok(metadata)
            }
            Ok(None) => {
                tracing::warn!(
                    url = %url,
                    "primary provider returned no usable data, trying fallback"
                );
                self.fallback(url).await
            }
            Err(primary_error) => {
                tracing::warn!(
                    url = %url,
                    error = %primary_error,
                    "primary provider failed, trying fallback"
                );
                match self.fallback(url).await {
                    Ok(metadata) => Ok(metadata),
                    Err(fallback_error) => {
                        tracing::debug!(error = %fallback_error, "discarding fallback error");
                        if primary_error.is_transport() {
                            tracing::error!(url = %url, "backend unreachable");
                            Err(Error::BackendUnreachable)
                        } else {
                            Err(primary_error)
                        }
                    }
                }
            }
        }
    }

    /// `Ok(None)` means the primary answered without usable data
    async fn primary(&self, url: &str) -> Result<Option<VideoMetadata>> {
        let reply = self.client.video_info(url).await?;
        if !reply.is_success() {
            tracing::debug!(status = %reply.status, "primary provider returned error status");
            return Ok(None);
        }

        let body: serde_json::Value = reply.decode()?;
        if !is_truthy(body.get("success")) {
            return Ok(None);
        }

        let metadata: VideoMetadata =
            serde_json::from_value(body).map_err(|e| Error::MalformedResponse {
                endpoint: reply.endpoint.to_string(),
                reason: e.to_string(),
            })?;

        if !metadata.formats.is_complete() {
            tracing::debug!(
                video = metadata.formats.video.len(),
                audio = metadata.formats.audio.len(),
                "primary provider returned incomplete format lists"
            );
            return Ok(None);
        }

        Ok(Some(metadata))
    }

    /// Every failure collapses into [`Error::ResolutionFailed`]
    async fn fallback(&self, url: &str) -> Result<VideoMetadata> {
        let reply = match self.client.fallback_provider(url).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "fallback provider request failed");
                return Err(unprocessable());
            }
        };

        let body: FallbackReply = match reply.decode() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "fallback provider returned malformed body");
                return Err(unprocessable());
            }
        };

        match body.download_url {
            Some(download_url) if body.success && !download_url.is_empty() => {
                let metadata =
                    synthesize_fallback_metadata(url, download_url, body.filename.as_deref());
                tracing::info!(
                    url = %url,
                    title = %metadata.title,
                    "resolved video via fallback provider"
                );
                Ok(metadata)
            }
            _ => {
                tracing::warn!(url = %url, "fallback provider returned no usable URL");
                Err(unprocessable())
            }
        }
    }
}

/// Build the minimal record used when only the alternative provider answered
pub fn synthesize_fallback_metadata(
    url: &str,
    download_url: String,
    filename: Option<&str>,
) -> VideoMetadata {
    let video_id = extract_video_id(url);
    let title = match filename {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Video {}", video_id),
    };

    VideoMetadata {
        id: FALLBACK_VIDEO_ID.to_string(),
        title,
        thumbnail: thumbnail_url(&video_id),
        duration: "N/A".to_string(),
        views: "N/A".to_string(),
        channel: "YouTube".to_string(),
        use_fallback_provider: true,
        fallback_download_url: Some(download_url),
        formats: FormatSet {
            video: vec![FormatDescriptor {
                format_id: "cobalt_best".to_string(),
                quality: "Best quality".to_string(),
                resolution: None,
                size_label: "N/A".to_string(),
                fps: Some(30),
                container_format: "MP4".to_string(),
                format_name: Some("MP4 (Auto)".to_string()),
                codec: Some("h264".to_string()),
            }],
            audio: vec![FormatDescriptor {
                format_id: "cobalt_audio".to_string(),
                quality: "320kbps".to_string(),
                resolution: None,
                size_label: "N/A".to_string(),
                fps: None,
                container_format: "MP3".to_string(),
                format_name: None,
                codec: None,
            }],
        },
    }
}

fn unprocessable() -> Error {
    Error::ResolutionFailed(UNPROCESSABLE_MESSAGE.to_string())
}

// JSON truthiness of the `success` flag
fn is_truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
