//! Download start requests

use crate::client::{BackendClient, DownloadRequest, StartReply};
use crate::error::{Error, Result};
use crate::types::{DownloadStart, FormatDescriptor, MediaKind};
use std::sync::Arc;

/// Message used when the backend gives no reason for a rejected start
pub const GENERIC_START_ERROR: &str = "error starting download";

/// Asks the backend to produce a downloadable file for a chosen format
#[derive(Debug, Clone)]
pub struct DownloadInitiator {
    client: Arc<BackendClient>,
}

impl DownloadInitiator {
    /// Create an initiator backed by `client`
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }

    /// Start a download of `format` for the video at `url`
    ///
    /// No retries: any failure is reported as
    /// [`Error::DownloadStartFailed`] for the user to retry manually.
    pub async fn start(
        &self,
        url: &str,
        format: &FormatDescriptor,
        kind: MediaKind,
        using_fallback_provider: bool,
        fallback_download_url: Option<&str>,
    ) -> Result<DownloadStart> {
        let request = build_request(
            url,
            format,
            kind,
            using_fallback_provider,
            fallback_download_url,
        );

        let reply = self
            .client
            .start_download(&request)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "download start request failed");
                Error::DownloadStartFailed {
                    message: e.to_string(),
                    transport: e.is_transport(),
                }
            })?;

        let body: StartReply = if reply.is_success() {
            reply.decode().map_err(|e| {
                tracing::warn!(error = %e, "download start returned malformed body");
                start_failed(None)
            })?
        } else {
            // error bodies are best-effort; the status alone is enough to fail
            let body: StartReply = reply.decode().unwrap_or_default();
            tracing::warn!(status = %reply.status, error = ?body.error, "download start rejected");
            return Err(start_failed(body.error));
        };

        if !body.success {
            tracing::warn!(error = ?body.error, "backend refused to start download");
            return Err(start_failed(body.error));
        }

        if let Some(direct) = body.direct_url.filter(|u| !u.is_empty()) {
            tracing::info!(format_id = %format.format_id, "backend returned direct download URL");
            return Ok(DownloadStart::Direct(direct));
        }

        match body.download_id.filter(|id| !id.is_empty()) {
            Some(job_id) => {
                tracing::info!(
                    job_id = %job_id,
                    format_id = %format.format_id,
                    "download job started"
                );
                Ok(DownloadStart::Job(job_id))
            }
            None => Err(start_failed(Some(
                "backend returned neither a direct URL nor a download id".to_string(),
            ))),
        }
    }
}

/// Map a chosen format onto the start request body
pub fn build_request<'a>(
    url: &'a str,
    format: &'a FormatDescriptor,
    kind: MediaKind,
    using_fallback_provider: bool,
    fallback_download_url: Option<&'a str>,
) -> DownloadRequest<'a> {
    let output_format = if format.container_format.is_empty() {
        "mp4".to_string()
    } else {
        format.container_format.to_lowercase()
    };
    DownloadRequest {
        url,
        format_id: &format.format_id,
        kind,
        output_format,
        codec: format.codec.as_deref().unwrap_or("h264"),
        use_cobalt: using_fallback_provider,
        cobalt_url: fallback_download_url.unwrap_or(""),
    }
}

fn start_failed(message: Option<String>) -> Error {
    Error::DownloadStartFailed {
        message: message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| GENERIC_START_ERROR.to_string()),
        transport: false,
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn initiator_for(backend_url: String) -> DownloadInitiator {
        let client = BackendClient::new(&BackendConfig {
            backend_url,
            request_timeout: None,
        })
        .unwrap();
        DownloadInitiator::new(Arc::new(client))
    }

    fn mkv_720() -> FormatDescriptor {
        FormatDescriptor {
            format_id: "22".into(),
            quality: "720p".into(),
            resolution: Some("1280x720".into()),
            size_label: "45 MB".into(),
            fps: Some(30),
            container_format: "MKV".into(),
            format_name: Some("MKV (H.264)".into()),
            codec: Some("h264".into()),
        }
    }

    fn mp3_audio() -> FormatDescriptor {
        FormatDescriptor {
            format_id: "140".into(),
            quality: "129kbps".into(),
            resolution: None,
            size_label: "3 MB".into(),
            fps: None,
            container_format: "MP3".into(),
            format_name: None,
            codec: None,
        }
    }

    #[test]
    fn request_defaults_codec_and_fallback_url() {
        let audio = mp3_audio();
        let request = build_request(URL, &audio, MediaKind::Audio, false, None);
        assert_eq!(request.output_format, "mp3");
        assert_eq!(request.codec, "h264");
        assert_eq!(request.cobalt_url, "");

        let mut no_container = mp3_audio();
        no_container.container_format.clear();
        let request = build_request(URL, &no_container, MediaKind::Audio, false, None);
        assert_eq!(request.output_format, "mp4");
    }

    #[tokio::test]
    async fn job_id_response_starts_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download"))
            .and(body_json(json!({
                "url": URL,
                "format_id": "22",
                "type": "video",
                "output_format": "mkv",
                "codec": "h264",
                "use_cobalt": false,
                "cobalt_url": ""
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "download_id": "4b7c0a",
                "message": "Download iniciado"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let start = initiator_for(server.uri())
            .start(URL, &mkv_720(), MediaKind::Video, false, None)
            .await
            .unwrap();

        assert_eq!(start, DownloadStart::Job("4b7c0a".into()));
    }

    #[tokio::test]
    async fn direct_url_response_skips_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download"))
            .and(body_json(json!({
                "url": URL,
                "format_id": "cobalt_best",
                "type": "video",
                "output_format": "mp4",
                "codec": "h264",
                "use_cobalt": true,
                "cobalt_url": "https://cobalt.example/tunnel/abc"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "direct_url": "https://cobalt.example/tunnel/abc",
                "download_id": "ignored"
            })))
            .mount(&server)
            .await;

        let format = FormatDescriptor {
            format_id: "cobalt_best".into(),
            container_format: "MP4".into(),
            ..mkv_720()
        };
        let start = initiator_for(server.uri())
            .start(
                URL,
                &format,
                MediaKind::Video,
                true,
                Some("https://cobalt.example/tunnel/abc"),
            )
            .await
            .unwrap();

        assert_eq!(
            start,
            DownloadStart::Direct("https://cobalt.example/tunnel/abc".into())
        );
    }

    #[tokio::test]
    async fn backend_error_message_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": false, "error": "format not available" })),
            )
            .mount(&server)
            .await;

        let err = initiator_for(server.uri())
            .start(URL, &mkv_720(), MediaKind::Video, false, None)
            .await
            .unwrap_err();

        match err {
            Error::DownloadStartFailed { message, transport } => {
                assert_eq!(message, "format not available");
                assert!(!transport);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_uses_body_message_or_generic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let err = initiator_for(server.uri())
            .start(URL, &mkv_720(), MediaKind::Video, false, None)
            .await
            .unwrap_err();

        assert!(
            matches!(
                err,
                Error::DownloadStartFailed { ref message, transport: false }
                    if message == GENERIC_START_ERROR
            ),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn missing_job_id_is_a_start_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .mount(&server)
            .await;

        let err = initiator_for(server.uri())
            .start(URL, &mkv_720(), MediaKind::Video, false, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DownloadStartFailed { .. }));
    }

    #[tokio::test]
    async fn unreachable_backend_is_flagged_as_transport() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = initiator_for(format!("http://{}", addr))
            .start(URL, &mkv_720(), MediaKind::Video, false, None)
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::DownloadStartFailed { transport: true, .. }),
            "{err:?}"
        );
        assert!(err.is_transport());
    }
}
