//! Mock VideoMax backend built on wiremock

use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use videomax_client::{Config, Session};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Video URL used across the integration tests
pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Primary provider body with two 720p containers, one 1080p and one audio format
pub fn video_info_body() -> Value {
    json!({
        "success": true,
        "id": "dQw4w9WgXcQ",
        "title": "Rick Astley - Never Gonna Give You Up",
        "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
        "duration": "3:33",
        "views": "1.5B",
        "channel": "Rick Astley",
        "formats": {
            "video": [
                {
                    "format_id": "22", "quality": "720p", "resolution": "1280x720",
                    "size": "45 MB", "fps": 30, "format": "MP4",
                    "format_name": "MP4 (H.264)", "codec": "h264"
                },
                {
                    "format_id": "22", "quality": "720p", "resolution": "1280x720",
                    "size": "45 MB", "fps": 30, "format": "MKV",
                    "format_name": "MKV (H.264)", "codec": "h264"
                },
                {
                    "format_id": "137", "quality": "1080p", "resolution": "1920x1080",
                    "size": "88 MB", "fps": 29.97, "format": "MP4",
                    "format_name": "MP4 (H.264)", "codec": "h264"
                }
            ],
            "audio": [
                {
                    "format_id": "140", "quality": "129kbps", "size": "3 MB",
                    "format": "MP3", "format_name": "MP3"
                }
            ]
        }
    })
}

/// Mount a primary provider answering with [`video_info_body`]
pub async fn mount_video_info(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/video-info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(video_info_body()))
        .mount(server)
        .await;
}

/// Mount a download start that hands out `job_id`
pub async fn mount_job_start(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "download_id": job_id })),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Mount status replies for `job_id`, served once each in order
pub async fn mount_status_sequence(server: &MockServer, job_id: &str, replies: &[Value]) {
    for reply in replies {
        Mock::given(method("GET"))
            .and(path(format!("/api/download-status/{}", job_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply.clone()))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

/// Mount a file retrieval answer for `job_id`
pub async fn mount_file(server: &MockServer, job_id: &str, filename: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/api/download-file/{}", job_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Content-Disposition",
                    format!("attachment; filename=\"{}\"", filename).as_str(),
                )
                .set_body_bytes(bytes.to_vec()),
        )
        .mount(server)
        .await;
}

/// Session against `server` with short polling delays and a temp download dir
pub fn test_session(server: &MockServer) -> (Session, TempDir) {
    let temp_dir = TempDir::new().unwrap_or_else(|e| panic!("temp dir: {e}"));
    let mut config = Config::with_backend(server.uri());
    config.polling.poll_interval = Duration::from_millis(10);
    config.polling.settle_delay = Duration::from_millis(20);
    config.storage.download_dir = temp_dir.path().join("downloads");
    let session = Session::new(config).unwrap_or_else(|e| panic!("session: {e}"));
    (session, temp_dir)
}

/// Base URL of a port with nothing listening on it
pub fn dead_backend_url() -> String {
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").unwrap_or_else(|e| panic!("bind: {e}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|e| panic!("local addr: {e}"));
    drop(listener);
    format!("http://{}", addr)
}
