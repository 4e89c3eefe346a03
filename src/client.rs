//! HTTP access to the VideoMax backend
//!
//! [`BackendClient`] knows the endpoint paths and wire shapes. It does not
//! interpret provider outcomes: deciding what a non-success status or a
//! `success:false` body means is left to the resolver, initiator and monitor.

use crate::config::{BackendConfig, FileCollisionAction};
use crate::error::{Error, Result};
use crate::types::{HealthStatus, MediaKind};
use crate::utils::{extract_filename_from_response, get_unique_path};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

/// Primary metadata endpoint
pub const VIDEO_INFO_PATH: &str = "api/video-info";
/// Alternative provider endpoint
pub const FALLBACK_PROVIDER_PATH: &str = "api/cobalt-download";
/// Download start endpoint
pub const DOWNLOAD_PATH: &str = "api/download";
/// Job status endpoint prefix (job id appended)
pub const DOWNLOAD_STATUS_PATH: &str = "api/download-status";
/// File retrieval endpoint prefix (job id appended)
pub const DOWNLOAD_FILE_PATH: &str = "api/download-file";
/// Health endpoint
pub const HEALTH_PATH: &str = "api/health";

/// Status code and body of a backend response
///
/// Kept undecoded so callers can tell a transport failure (no reply at all)
/// apart from an HTTP error status or an unexpected body.
#[derive(Debug, Clone)]
pub(crate) struct RawReply {
    pub(crate) status: reqwest::StatusCode,
    pub(crate) body: Vec<u8>,
    pub(crate) endpoint: &'static str,
}

impl RawReply {
    pub(crate) fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body, reporting failures as [`Error::MalformedResponse`]
    pub(crate) fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::MalformedResponse {
            endpoint: self.endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct VideoInfoRequest<'a> {
    pub(crate) url: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct FallbackRequest<'a> {
    pub(crate) url: &'a str,
    #[serde(rename = "type")]
    pub(crate) kind: MediaKind,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FallbackReply {
    #[serde(default)]
    pub(crate) success: bool,
    #[serde(default)]
    pub(crate) download_url: Option<String>,
    #[serde(default)]
    pub(crate) filename: Option<String>,
}

/// Body of a download start request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest<'a> {
    /// Source video URL
    pub url: &'a str,
    /// Chosen format id
    pub format_id: &'a str,
    /// Media kind
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Lowercase output container
    pub output_format: String,
    /// Video codec
    pub codec: &'a str,
    /// Route through the alternative provider
    pub use_cobalt: bool,
    /// Alternative provider media URL ("" when unused)
    pub cobalt_url: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StartReply {
    #[serde(default)]
    pub(crate) success: bool,
    #[serde(default)]
    pub(crate) direct_url: Option<String>,
    #[serde(default)]
    pub(crate) download_id: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StatusReply {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) progress: Option<f64>,
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) filename: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorReply {
    #[serde(default)]
    error: Option<String>,
}

/// Thin async client for the backend endpoints
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
}

impl BackendClient {
    /// Build a client from backend settings
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut base = Url::parse(&config.backend_url).map_err(|e| Error::Config {
            message: format!("invalid backend URL '{}': {}", config.backend_url, e),
            key: Some("backend_url".to_string()),
        })?;
        // joining relative paths must keep any path prefix of the base
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| Error::Config {
            message: format!("failed to create HTTP client: {}", e),
            key: None,
        })?;

        Ok(Self { http, base })
    }

    /// Backend base URL (always ends with `/`)
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|e| Error::Config {
            message: format!("cannot build endpoint '{}': {}", path, e),
            key: Some("backend_url".to_string()),
        })
    }

    fn job_endpoint(&self, prefix: &str, job_id: &str) -> Result<Url> {
        self.endpoint(&format!("{}/{}", prefix, urlencoding::encode(job_id)))
    }

    /// File retrieval URL for a completed job
    pub fn file_url(&self, job_id: &str) -> Result<Url> {
        self.job_endpoint(DOWNLOAD_FILE_PATH, job_id)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &'static str,
        body: &B,
    ) -> Result<RawReply> {
        let url = self.endpoint(path)?;
        tracing::debug!(endpoint = path, "POST");
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        Ok(RawReply {
            status,
            body,
            endpoint: path,
        })
    }

    async fn get(&self, url: Url, endpoint: &'static str) -> Result<RawReply> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        Ok(RawReply {
            status,
            body,
            endpoint,
        })
    }

    pub(crate) async fn video_info(&self, url: &str) -> Result<RawReply> {
        self.post_json(VIDEO_INFO_PATH, &VideoInfoRequest { url })
            .await
    }

    pub(crate) async fn fallback_provider(&self, url: &str) -> Result<RawReply> {
        self.post_json(
            FALLBACK_PROVIDER_PATH,
            &FallbackRequest {
                url,
                kind: MediaKind::Video,
            },
        )
        .await
    }

    pub(crate) async fn start_download(&self, request: &DownloadRequest<'_>) -> Result<RawReply> {
        self.post_json(DOWNLOAD_PATH, request).await
    }

    /// Read the current job status
    ///
    /// Any failure, including an undecodable body, is an error: the monitor
    /// treats all of them as the end of observation.
    pub(crate) async fn download_status(&self, job_id: &str) -> Result<StatusReply> {
        let url = self.job_endpoint(DOWNLOAD_STATUS_PATH, job_id)?;
        self.get(url, DOWNLOAD_STATUS_PATH).await?.decode()
    }

    /// Ask the backend whether it is serving
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.endpoint(HEALTH_PATH)?;
        let reply = self.get(url, HEALTH_PATH).await?;
        if !reply.is_success() {
            return Err(Error::MalformedResponse {
                endpoint: HEALTH_PATH.to_string(),
                reason: format!("unexpected status {}", reply.status),
            });
        }
        reply.decode()
    }

    /// Stream a completed job's file into `dest_dir`
    ///
    /// The file name comes from the response (see
    /// [`extract_filename_from_response`]); collisions are resolved with
    /// `collision`. Data is written to a `.part` file that is renamed into
    /// place once the body has been fully received.
    pub async fn download_file(
        &self,
        job_id: &str,
        dest_dir: &Path,
        collision: FileCollisionAction,
    ) -> Result<PathBuf> {
        let url = self.file_url(job_id)?;
        let response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = serde_json::from_slice::<ErrorReply>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("backend returned status {}", status));
            return Err(Error::NotFound(format!("file for download {}: {}", job_id, message)));
        }

        tokio::fs::create_dir_all(dest_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create download directory '{}': {}",
                    dest_dir.display(),
                    e
                ),
            ))
        })?;

        let filename = extract_filename_from_response(&response, url.as_str());
        let target = get_unique_path(&dest_dir.join(&filename), collision)?;
        let partial = target.with_file_name(format!(
            "{}.part",
            target
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("download")
        ));

        let written = save_body(response.bytes_stream(), &partial, &target).await?;

        tracing::info!(
            job_id = %job_id,
            path = %target.display(),
            bytes = written,
            "retrieved download file"
        );
        Ok(target)
    }
}

/// Write `body` to `partial`, then move it to `target`
///
/// `partial` never outlives a failure, whether it happens while receiving,
/// writing or renaming.
async fn save_body<S, C, E>(body: S, partial: &Path, target: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<C, E>>,
    C: AsRef<[u8]>,
    Error: From<E>,
{
    let written = match write_partial(body, partial).await {
        Ok(written) => written,
        Err(e) => {
            tokio::fs::remove_file(partial).await.ok();
            return Err(e);
        }
    };
    if let Err(e) = tokio::fs::rename(partial, target).await {
        tokio::fs::remove_file(partial).await.ok();
        return Err(e.into());
    }
    Ok(written)
}

async fn write_partial<S, C, E>(body: S, partial: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<C, E>>,
    C: AsRef<[u8]>,
    Error: From<E>,
{
    let mut body = std::pin::pin!(body);
    let mut file = tokio::fs::File::create(partial).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(chunk.as_ref()).await?;
        written += chunk.as_ref().len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BackendClient {
        BackendClient::new(&BackendConfig {
            backend_url: server.uri(),
            request_timeout: None,
        })
        .unwrap()
    }

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let client = BackendClient::new(&BackendConfig {
            backend_url: "http://example.com/videomax".into(),
            request_timeout: None,
        })
        .unwrap();

        assert_eq!(
            client.endpoint(VIDEO_INFO_PATH).unwrap().as_str(),
            "http://example.com/videomax/api/video-info"
        );
        assert_eq!(
            client.file_url("a b/c").unwrap().as_str(),
            "http://example.com/videomax/api/download-file/a%20b%2Fc"
        );
    }

    #[test]
    fn rejects_unparseable_backend_url() {
        let err = BackendClient::new(&BackendConfig {
            backend_url: "not a url".into(),
            request_timeout: None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn download_request_uses_wire_names() {
        let request = DownloadRequest {
            url: "https://youtu.be/dQw4w9WgXcQ",
            format_id: "22",
            kind: MediaKind::Audio,
            output_format: "mp3".into(),
            codec: "h264",
            use_cobalt: false,
            cobalt_url: "",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "audio");
        assert_eq!(value["format_id"], "22");
        assert_eq!(value["use_cobalt"], false);
        assert_eq!(value["cobalt_url"], "");
    }

    #[tokio::test]
    async fn video_info_posts_url_and_keeps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/video-info"))
            .and(body_json(serde_json::json!({ "url": "https://youtu.be/x" })))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({ "error": "boom" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .video_info("https://youtu.be/x")
            .await
            .unwrap();

        assert!(!reply.is_success());
        assert_eq!(reply.status.as_u16(), 400);
    }

    #[tokio::test]
    async fn download_status_rejects_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/download-status/job-1"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .download_status("job-1")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedResponse { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "status": "ok", "message": "VideoMax Backend Online" }),
            ))
            .mount(&server)
            .await;

        let health = client_for(&server).health().await.unwrap();
        assert!(health.is_ok());
        assert_eq!(health.message, "VideoMax Backend Online");
    }

    #[tokio::test]
    async fn download_file_writes_content_disposition_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/download-file/job-7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "Content-Disposition",
                        r#"attachment; filename="Never Gonna Give You Up.mp4""#,
                    )
                    .set_body_bytes(b"fake mp4 bytes".to_vec()),
            )
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let saved = client_for(&server)
            .download_file("job-7", dir.path(), FileCollisionAction::Rename)
            .await
            .unwrap();

        assert_eq!(saved, dir.path().join("Never Gonna Give You Up.mp4"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"fake mp4 bytes");
        assert!(
            !dir.path().join("Never Gonna Give You Up.mp4.part").exists(),
            "partial file must be renamed away"
        );
    }

    #[tokio::test]
    async fn download_file_renames_on_collision() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/download-file/job-8"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=song.mp3")
                    .set_body_bytes(b"new".to_vec()),
            )
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"old").unwrap();

        let saved = client_for(&server)
            .download_file("job-8", dir.path(), FileCollisionAction::Rename)
            .await
            .unwrap();

        assert_eq!(saved, dir.path().join("song (1).mp3"));
        assert_eq!(std::fs::read(dir.path().join("song.mp3")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn failed_body_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("clip.mp4.part");
        let target = dir.path().join("clip.mp4");
        let body = futures::stream::iter(vec![
            Ok(b"first chunk".to_vec()),
            Err(std::io::Error::other("No space left on device")),
        ]);

        let err = save_body(body, &partial, &target).await.unwrap_err();

        assert!(matches!(err, Error::Io(_)), "{err:?}");
        assert!(!partial.exists());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("clip.mp4.part");
        // a non-empty directory cannot be replaced by a file
        let target = dir.path().join("clip.mp4");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();
        let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(b"bytes".to_vec())]);

        let err = save_body(body, &partial, &target).await.unwrap_err();

        assert!(matches!(err, Error::Io(_)), "{err:?}");
        assert!(!partial.exists());
        assert!(target.join("keep").exists());
    }

    #[tokio::test]
    async fn saved_body_reports_written_bytes() {
        let dir = TempDir::new().unwrap();
        let partial = dir.path().join("song.mp3.part");
        let target = dir.path().join("song.mp3");
        let body = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(b"abc".to_vec()),
            Ok(b"de".to_vec()),
        ]);

        let written = save_body(body, &partial, &target).await.unwrap();

        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&target).unwrap(), b"abcde");
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn download_file_surfaces_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/download-file/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(
                serde_json::json!({ "error": "Download não encontrado ou não completo" }),
            ))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let err = client_for(&server)
            .download_file("missing", dir.path(), FileCollisionAction::Rename)
            .await
            .unwrap_err();

        match err {
            Error::NotFound(message) => {
                assert!(message.contains("não encontrado"), "{message}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
