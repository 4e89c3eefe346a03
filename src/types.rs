//! Core types for videomax-client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FailureKind;

/// Which list of a [`FormatSet`] a format belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video with audio
    Video,
    /// Audio only
    Audio,
}

impl MediaKind {
    /// Wire name used in the download request `type` field
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downloadable format offered for a video
///
/// `format_id` identifies the format within a single resolution result only;
/// the same id can appear several times with different containers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Backend format identifier
    pub format_id: String,
    /// Quality label ("1080p", "320kbps", ...)
    pub quality: String,
    /// Resolution label ("1920x1080"); absent for audio and synthesized formats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Human-readable size ("45 MB", "N/A")
    #[serde(
        rename = "size",
        default = "not_available",
        deserialize_with = "null_as_not_available"
    )]
    pub size_label: String,
    /// Frames per second
    #[serde(
        default,
        deserialize_with = "lenient_fps",
        skip_serializing_if = "Option::is_none"
    )]
    pub fps: Option<u32>,
    /// Output container ("MP4", "MKV", "MP3", ...)
    #[serde(rename = "format")]
    pub container_format: String,
    /// Display name ("MP4 (H.264)")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_name: Option<String>,
    /// Video codec requested for conversion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

/// Video and audio format lists of a resolved video
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatSet {
    /// Video formats, highest quality first as sent by the backend
    #[serde(default)]
    pub video: Vec<FormatDescriptor>,
    /// Audio-only formats
    #[serde(default)]
    pub audio: Vec<FormatDescriptor>,
}

impl FormatSet {
    /// Both lists hold at least one format
    pub fn is_complete(&self) -> bool {
        !self.video.is_empty() && !self.audio.is_empty()
    }

    /// Format list for a media kind
    pub fn list(&self, kind: MediaKind) -> &[FormatDescriptor] {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    /// Format at `index` within the list for `kind`
    pub fn get(&self, kind: MediaKind, index: usize) -> Option<&FormatDescriptor> {
        self.list(kind).get(index)
    }

    /// Group video formats by quality label, best quality first
    ///
    /// Groups are ordered by the numeric prefix of the label (`"1080p"` sorts
    /// above `"720p"`); labels without a number sort last. Within a group the
    /// backend order is kept, and each entry remembers its index into
    /// [`FormatSet::video`] so a choice can be passed back to
    /// [`Session::download`](crate::Session::download).
    pub fn video_by_quality(&self) -> Vec<QualityGroup> {
        let mut groups: Vec<QualityGroup> = Vec::new();
        for (index, format) in self.video.iter().enumerate() {
            match groups.iter_mut().find(|g| g.quality == format.quality) {
                Some(group) => group.formats.push(index),
                None => groups.push(QualityGroup {
                    quality: format.quality.clone(),
                    resolution: format.resolution.clone(),
                    fps: format.fps,
                    speed: SpeedTier::for_quality(&format.quality),
                    formats: vec![index],
                }),
            }
        }
        // stable sort keeps first-seen order among equal heights
        groups.sort_by(|a, b| quality_height(&b.quality).cmp(&quality_height(&a.quality)));
        groups
    }
}

/// Video formats sharing one quality label
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityGroup {
    /// Quality label shared by every format in the group
    pub quality: String,
    /// Resolution of the first format seen with this label
    pub resolution: Option<String>,
    /// Frame rate of the first format seen with this label
    pub fps: Option<u32>,
    /// Expected processing speed
    pub speed: SpeedTier,
    /// Indices into [`FormatSet::video`]
    pub formats: Vec<usize>,
}

/// Rough processing speed expectation for a quality label
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    /// 480p and below
    Fast,
    /// Up to 720p
    Medium,
    /// Above 720p, or unknown
    Slow,
}

impl SpeedTier {
    /// Classify a quality label such as `"720p"`
    pub fn for_quality(quality: &str) -> Self {
        match quality_height(quality) {
            Some(h) if h <= 480 => SpeedTier::Fast,
            Some(h) if h <= 720 => SpeedTier::Medium,
            _ => SpeedTier::Slow,
        }
    }
}

/// Leading integer of a quality label ("1080p" -> 1080)
fn quality_height(quality: &str) -> Option<u32> {
    let digits: String = quality
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Normalized metadata for the currently analyzed video
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Provider video id (`cobalt_provider` for synthesized records)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    /// Title
    #[serde(deserialize_with = "null_as_empty")]
    pub title: String,
    /// Thumbnail URL
    #[serde(default, deserialize_with = "null_as_empty")]
    pub thumbnail: String,
    /// Duration label ("3:33", "N/A")
    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub duration: String,
    /// View count label ("1.2M", "N/A")
    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub views: String,
    /// Channel or uploader name
    #[serde(default, deserialize_with = "null_as_empty")]
    pub channel: String,
    /// Downloads must go through the alternative provider
    #[serde(rename = "use_cobalt", default)]
    pub use_fallback_provider: bool,
    /// Media URL handed out by the alternative provider
    #[serde(rename = "cobalt_url", default, skip_serializing_if = "Option::is_none")]
    pub fallback_download_url: Option<String>,
    /// Available formats
    #[serde(default)]
    pub formats: FormatSet,
}

/// Backend job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, not yet transferring
    Queued,
    /// Transferring or converting
    Downloading,
    /// File ready for retrieval
    Completed,
    /// Job failed
    Error,
}

impl JobStatus {
    /// No further polling happens after this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// Snapshot of a backend download job as observed by one status poll
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    /// Backend job id
    pub download_id: String,
    /// Observed status
    pub status: JobStatus,
    /// Progress percentage (0 to 100)
    pub progress_percent: u8,
    /// Backend error message for failed jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Output filename reported by the backend once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// When the snapshot was taken
    pub observed_at: DateTime<Utc>,
}

/// Outcome of asking the backend to start a download
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DownloadStart {
    /// Link usable immediately; no job to watch
    Direct(String),
    /// Backend job id to hand to the progress monitor
    Job(String),
}

/// Backend health report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" when the backend is serving
    pub status: String,
    /// Free-form message
    #[serde(default)]
    pub message: String,
}

impl HealthStatus {
    /// Backend reported itself healthy
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Events emitted by a [`Session`](crate::Session)
///
/// These are the whole surface a presentation layer needs: subscribe once and
/// render each event as it arrives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A URL passed validation and resolution began
    AnalysisStarted {
        /// Trimmed input URL
        url: String,
    },

    /// Metadata resolved and became the active video
    MetadataResolved {
        /// Resolved record
        metadata: VideoMetadata,
    },

    /// Input rejected or both provider tiers failed
    ResolutionFailed {
        /// Failure class
        kind: FailureKind,
        /// Human-readable message
        message: String,
    },

    /// Backend could not be reached; show setup guidance
    BackendUnreachable,

    /// A download was requested for a format of the active video
    DownloadRequested {
        /// Media kind
        kind: MediaKind,
        /// Chosen format id
        format_id: String,
        /// Chosen format quality label
        quality: String,
    },

    /// Backend answered with a link to open immediately
    DirectUrlReady {
        /// Direct link
        url: String,
    },

    /// Backend accepted the download as a tracked job
    DownloadStarted {
        /// Backend job id
        job_id: String,
    },

    /// Job progress snapshot
    Progress {
        /// Observed job state
        job: DownloadJob,
    },

    /// Job completed and the file can be retrieved
    DownloadReady {
        /// Backend job id
        job_id: String,
        /// Absolute file retrieval URL
        file_url: String,
    },

    /// Job start rejected or job failed on the backend
    DownloadFailed {
        /// Backend job id, when one was assigned
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
        /// Failure class
        kind: FailureKind,
        /// Error message
        message: String,
    },

    /// Watching stopped because a poll failed at the transport level
    PollFailed {
        /// Backend job id
        job_id: String,
        /// Failure description
        message: String,
    },

    /// Watching stopped because a bound was exceeded
    WatchTimedOut {
        /// Backend job id
        job_id: String,
        /// Polls issued
        polls: u32,
    },

    /// Watching stopped on caller request
    WatchCancelled {
        /// Backend job id
        job_id: String,
    },

    /// Active video discarded
    Cleared,
}

fn not_available() -> String {
    "N/A".to_string()
}

// The backend copies extractor fields that may be null straight into its replies
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_not_available<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(not_available))
}

// Backend sends fps as a float (29.97) or null
fn lenient_fps<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let fps = Option::<f64>::deserialize(deserializer)?;
    Ok(fps
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f.round() as u32))
}
