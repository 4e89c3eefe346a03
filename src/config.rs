//! Configuration types for videomax-client

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Backend connection settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the VideoMax backend (default: "http://localhost:5000")
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Per-request timeout (None = wait indefinitely, the historical behavior)
    #[serde(default, with = "optional_duration_ms_serde")]
    pub request_timeout: Option<Duration>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            request_timeout: None,
        }
    }
}

/// Job status polling settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between status polls while a job is downloading (default: 500ms)
    #[serde(default = "default_poll_interval", with = "duration_ms_serde")]
    pub poll_interval: Duration,

    /// Delay between observing completion and signalling file readiness (default: 1500ms)
    ///
    /// Gives the presentation layer time to show the finished state.
    #[serde(default = "default_settle_delay", with = "duration_ms_serde")]
    pub settle_delay: Duration,

    /// Stop watching after this long (None = unbounded)
    #[serde(default, with = "optional_duration_ms_serde")]
    pub max_watch_duration: Option<Duration>,

    /// Stop watching after this many status polls (None = unbounded)
    #[serde(default)]
    pub max_polls: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            settle_delay: default_settle_delay(),
            max_watch_duration: None,
            max_polls: None,
        }
    }
}

/// Local storage for retrieved files
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory retrieved files are written to (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// File collision handling
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

/// Main configuration for [`Session`](crate::Session)
///
/// Sub-config fields are flattened, so the serialized form is a single flat
/// object:
///
/// ```json
/// { "backend_url": "http://localhost:5000", "poll_interval": 500, "max_polls": 600 }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings
    #[serde(flatten)]
    pub backend: BackendConfig,

    /// Job status polling settings
    #[serde(flatten)]
    pub polling: PollingConfig,

    /// Retrieved file storage
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Capacity of the session event broadcast channel (default: 256)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            polling: PollingConfig::default(),
            storage: StorageConfig::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Config {
    /// Create a configuration pointing at the given backend with defaults elsewhere
    pub fn with_backend(backend_url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig {
                backend_url: backend_url.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Parsed backend base URL
    pub fn backend_url(&self) -> Result<url::Url> {
        let parsed = url::Url::parse(&self.backend.backend_url).map_err(|e| Error::Config {
            message: format!("invalid backend URL '{}': {}", self.backend.backend_url, e),
            key: Some("backend_url".to_string()),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!(
                    "backend URL must use http or https, got '{}'",
                    parsed.scheme()
                ),
                key: Some("backend_url".to_string()),
            });
        }
        Ok(parsed)
    }

    /// Check the configuration for values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        self.backend_url()?;
        if self.event_buffer == 0 {
            return Err(Error::Config {
                message: "event buffer must hold at least one event".to_string(),
                key: Some("event_buffer".to_string()),
            });
        }
        if self.polling.max_polls == Some(0) {
            return Err(Error::Config {
                message: "max_polls must be at least 1 when set".to_string(),
                key: Some("max_polls".to_string()),
            });
        }
        Ok(())
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Skip the file, keep existing
    Skip,
}

fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(1500)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_event_buffer() -> usize {
    256
}

// Durations are written as integer milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod optional_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
