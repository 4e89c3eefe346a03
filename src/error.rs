//! Error types for videomax-client
//!
//! This module provides the error taxonomy for the library:
//! - Input validation failures detected before any network call
//! - Metadata resolution failures (both provider tiers exhausted)
//! - Download start and job observation failures
//! - Machine-readable error codes and failure kinds for presentation layers

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for videomax-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for videomax-client
///
/// Each variant carries enough context for a presentation layer to pick the
/// right surface (toast, guidance panel, inline message).
#[derive(Debug, Error)]
pub enum Error {
    /// Empty or malformed URL supplied by the user
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Both metadata tiers failed at the transport level
    #[error("backend unreachable: is the VideoMax server running?")]
    BackendUnreachable,

    /// Both metadata tiers answered but neither produced usable data
    #[error("resolution failed: {0}")]
    ResolutionFailed(String),

    /// Backend rejected or errored on job start
    #[error("failed to start download: {message}")]
    DownloadStartFailed {
        /// Backend error message, or a generic message when none was sent
        message: String,
        /// True when the request never reached the backend
        transport: bool,
    },

    /// Backend reported the job as failed while it was being watched
    #[error("download {job_id} failed: {message}")]
    JobFailed {
        /// Backend job id
        job_id: String,
        /// Backend error message
        message: String,
    },

    /// A status poll failed; watching stopped without retrying
    #[error("status poll for download {job_id} failed: {message}")]
    PollFailed {
        /// Backend job id
        job_id: String,
        /// Description of the transport or decode failure
        message: String,
    },

    /// A watch bound (poll count or duration) was exceeded
    #[error("watching download {job_id} timed out after {polls} polls ({elapsed:?})")]
    WatchTimedOut {
        /// Backend job id
        job_id: String,
        /// Number of status polls issued before giving up
        polls: u32,
        /// Time spent watching
        elapsed: Duration,
    },

    /// Watching was cancelled by the caller
    #[error("watching download {job_id} was cancelled")]
    WatchCancelled {
        /// Backend job id
        job_id: String,
    },

    /// Request could not be delivered or its body could not be read
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a body that does not match the expected shape
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        /// Endpoint path that produced the body
        endpoint: String,
        /// Decoder error description
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "backend_url")
        key: Option<String>,
    },

    /// Backend has no retrievable file for a job
    #[error("not found: {0}")]
    NotFound(String),

    /// Destination file already exists and collision action forbids replacing it
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// The reason for the collision
        reason: String,
    },

    /// Invalid path encountered while saving a retrieved file
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

/// Coarse failure classes surfaced to the presentation layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// User must correct the input; never retried by the system
    InvalidInput,
    /// Backend could not be reached; show setup guidance
    BackendUnreachable,
    /// Providers answered without usable data; prompt a retry
    ResolutionFailed,
    /// Job start rejected
    DownloadStartFailed,
    /// Backend reported a failed job
    JobError,
    /// Network failure while polling job status
    TransportErrorDuringPoll,
    /// Watch bound exceeded or watch cancelled
    WatchAborted,
    /// Anything else (local I/O, configuration, unexpected bodies)
    Internal,
}

impl Error {
    /// Classify this error for presentation
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::InvalidInput(_) => FailureKind::InvalidInput,
            Error::BackendUnreachable => FailureKind::BackendUnreachable,
            Error::DownloadStartFailed {
                transport: true, ..
            } => FailureKind::BackendUnreachable,
            Error::ResolutionFailed(_) => FailureKind::ResolutionFailed,
            Error::DownloadStartFailed { .. } => FailureKind::DownloadStartFailed,
            Error::JobFailed { .. } => FailureKind::JobError,
            Error::PollFailed { .. } => FailureKind::TransportErrorDuringPoll,
            Error::WatchTimedOut { .. } | Error::WatchCancelled { .. } => {
                FailureKind::WatchAborted
            }
            Error::Transport(_)
            | Error::MalformedResponse { .. }
            | Error::Io(_)
            | Error::Config { .. }
            | Error::NotFound(_)
            | Error::FileCollision { .. }
            | Error::InvalidPath { .. } => FailureKind::Internal,
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::BackendUnreachable => "backend_unreachable",
            Error::ResolutionFailed(_) => "resolution_failed",
            Error::DownloadStartFailed { .. } => "download_start_failed",
            Error::JobFailed { .. } => "job_error",
            Error::PollFailed { .. } => "poll_failed",
            Error::WatchTimedOut { .. } => "watch_timed_out",
            Error::WatchCancelled { .. } => "watch_cancelled",
            Error::Transport(_) => "network_error",
            Error::MalformedResponse { .. } => "malformed_response",
            Error::Io(_) => "io_error",
            Error::Config { .. } => "config_error",
            Error::NotFound(_) => "not_found",
            Error::FileCollision { .. } => "file_collision",
            Error::InvalidPath { .. } => "invalid_path",
        }
    }

    /// True when the request never produced a readable HTTP response
    ///
    /// Only request delivery and body reads count; HTTP error statuses and
    /// undecodable bodies are not transport failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::BackendUnreachable
                | Error::DownloadStartFailed {
                    transport: true,
                    ..
                }
        )
    }
}
