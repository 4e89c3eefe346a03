//! Download job progress polling
//!
//! [`ProgressMonitor::watch`] turns the backend's status endpoint into a lazy
//! stream of [`WatchEvent`]s. Nothing is spawned: every poll and delay runs
//! inside the consumer's `next().await`, and dropping the stream stops
//! watching.
//!
//! The stream is finite. It ends after exactly one terminal event:
//! [`WatchEvent::Ready`], an error [`WatchEvent::Progress`] snapshot,
//! [`WatchEvent::PollFailed`], [`WatchEvent::TimedOut`] or
//! [`WatchEvent::Cancelled`].

use crate::client::{BackendClient, StatusReply};
use crate::config::PollingConfig;
use crate::types::{DownloadJob, JobStatus};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Bounds and cancellation for a single watch
///
/// The default is unbounded and never cancelled.
#[derive(Clone, Debug, Default)]
pub struct WatchOptions {
    /// Give up after this long
    pub max_duration: Option<Duration>,
    /// Give up after this many status polls
    pub max_polls: Option<u32>,
    /// Stop watching when cancelled
    pub cancel: CancellationToken,
}

impl WatchOptions {
    /// Bounds taken from polling configuration, with a fresh cancellation token
    pub fn from_config(config: &PollingConfig) -> Self {
        Self {
            max_duration: config.max_watch_duration,
            max_polls: config.max_polls,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` to stop the watch
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// One item of a job watch
#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent {
    /// Job snapshot; terminal when its status is [`JobStatus::Error`]
    Progress(DownloadJob),
    /// Job completed and the settle delay elapsed; the file can be fetched
    Ready {
        /// Backend job id
        job_id: String,
        /// Absolute file retrieval URL
        file_url: String,
        /// Output filename reported by the backend, if any
        filename: Option<String>,
    },
    /// A status poll failed; no retry is attempted
    PollFailed {
        /// Backend job id
        job_id: String,
        /// Failure description
        message: String,
    },
    /// A watch bound was exceeded
    TimedOut {
        /// Backend job id
        job_id: String,
        /// Polls issued
        polls: u32,
        /// Time spent watching
        elapsed: Duration,
    },
    /// The cancellation token fired
    Cancelled {
        /// Backend job id
        job_id: String,
    },
}

impl WatchEvent {
    /// True for the last event a watch produces
    pub fn is_terminal(&self) -> bool {
        match self {
            WatchEvent::Progress(job) => job.status == JobStatus::Error,
            _ => true,
        }
    }
}

/// Polls job status until a terminal state
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    client: Arc<BackendClient>,
    poll_interval: Duration,
    settle_delay: Duration,
}

impl ProgressMonitor {
    /// Create a monitor using the configured poll interval and settle delay
    pub fn new(client: Arc<BackendClient>, config: &PollingConfig) -> Self {
        Self {
            client,
            poll_interval: config.poll_interval,
            settle_delay: config.settle_delay,
        }
    }

    /// Watch `job_id` until it reaches a terminal state
    ///
    /// The first poll is issued immediately; later polls follow the poll
    /// interval. A completed job yields a 100% snapshot, then after the
    /// settle delay a [`WatchEvent::Ready`]. Each call starts an independent
    /// watch.
    pub fn watch(
        &self,
        job_id: impl Into<String>,
        options: WatchOptions,
    ) -> BoxStream<'static, WatchEvent> {
        let started = Instant::now();
        let state = WatchState {
            client: Arc::clone(&self.client),
            job_id: job_id.into(),
            poll_interval: self.poll_interval,
            settle_delay: self.settle_delay,
            deadline: options.max_duration.map(|d| started + d),
            max_polls: options.max_polls,
            cancel: options.cancel,
            started,
            polls: 0,
            phase: Phase::Poll,
        };
        stream::unfold(state, next_event).boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Poll,
    Settle { filename: Option<String> },
    Done,
}

struct WatchState {
    client: Arc<BackendClient>,
    job_id: String,
    poll_interval: Duration,
    settle_delay: Duration,
    deadline: Option<Instant>,
    max_polls: Option<u32>,
    cancel: CancellationToken,
    started: Instant,
    polls: u32,
    phase: Phase,
}

impl WatchState {
    fn finish(mut self, event: WatchEvent) -> Option<(WatchEvent, WatchState)> {
        self.phase = Phase::Done;
        Some((event, self))
    }

    fn timed_out(self) -> Option<(WatchEvent, WatchState)> {
        tracing::warn!(
            job_id = %self.job_id,
            polls = self.polls,
            "stopped watching download: bound exceeded"
        );
        let event = WatchEvent::TimedOut {
            job_id: self.job_id.clone(),
            polls: self.polls,
            elapsed: self.started.elapsed(),
        };
        self.finish(event)
    }

    fn cancelled(self) -> Option<(WatchEvent, WatchState)> {
        tracing::debug!(job_id = %self.job_id, "watch cancelled");
        let event = WatchEvent::Cancelled {
            job_id: self.job_id.clone(),
        };
        self.finish(event)
    }

    /// Sleep for `delay`; false if cancelled first
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

enum PollOutcome {
    Reply(crate::error::Result<StatusReply>),
    Cancelled,
    DeadlineReached,
}

async fn next_event(mut state: WatchState) -> Option<(WatchEvent, WatchState)> {
    match std::mem::replace(&mut state.phase, Phase::Done) {
        Phase::Done => None,
        Phase::Settle { filename } => {
            if !state.pause(state.settle_delay).await {
                return state.cancelled();
            }
            let event = match state.client.file_url(&state.job_id) {
                Ok(url) => {
                    tracing::info!(job_id = %state.job_id, "download ready for retrieval");
                    WatchEvent::Ready {
                        job_id: state.job_id.clone(),
                        file_url: url.to_string(),
                        filename,
                    }
                }
                Err(e) => WatchEvent::PollFailed {
                    job_id: state.job_id.clone(),
                    message: e.to_string(),
                },
            };
            state.finish(event)
        }
        Phase::Poll => {
            if state.polls > 0 {
                let delay = match state.deadline {
                    Some(d) => state
                        .poll_interval
                        .min(d.saturating_duration_since(Instant::now())),
                    None => state.poll_interval,
                };
                if !state.pause(delay).await {
                    return state.cancelled();
                }
            }
            if state.cancel.is_cancelled() {
                return state.cancelled();
            }
            if state.max_polls.is_some_and(|max| state.polls >= max) || state.deadline_passed() {
                return state.timed_out();
            }

            state.polls += 1;
            let outcome = poll_once(&state).await;
            let reply = match outcome {
                PollOutcome::Cancelled => return state.cancelled(),
                PollOutcome::DeadlineReached => return state.timed_out(),
                PollOutcome::Reply(Ok(reply)) => reply,
                PollOutcome::Reply(Err(e)) => {
                    tracing::warn!(
                        job_id = %state.job_id,
                        error = %e,
                        "status poll failed, stopping"
                    );
                    let event = WatchEvent::PollFailed {
                        job_id: state.job_id.clone(),
                        message: e.to_string(),
                    };
                    return state.finish(event);
                }
            };

            let job = snapshot(&state.job_id, reply);
            match job.status {
                JobStatus::Queued | JobStatus::Downloading => {
                    tracing::debug!(
                        job_id = %state.job_id,
                        progress = job.progress_percent,
                        "download progress"
                    );
                    state.phase = Phase::Poll;
                }
                JobStatus::Completed => {
                    tracing::info!(
                        job_id = %state.job_id,
                        polls = state.polls,
                        "download completed"
                    );
                    state.phase = Phase::Settle {
                        filename: job.filename.clone(),
                    };
                }
                JobStatus::Error => {
                    tracing::warn!(
                        job_id = %state.job_id,
                        error = ?job.error_message,
                        "download failed on backend"
                    );
                }
            }
            Some((WatchEvent::Progress(job), state))
        }
    }
}

async fn poll_once(state: &WatchState) -> PollOutcome {
    let request = state.client.download_status(&state.job_id);
    let bounded = async {
        match state.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, request).await {
                Ok(reply) => PollOutcome::Reply(reply),
                Err(_) => PollOutcome::DeadlineReached,
            },
            None => PollOutcome::Reply(request.await),
        }
    };
    tokio::select! {
        biased;
        _ = state.cancel.cancelled() => PollOutcome::Cancelled,
        outcome = bounded => outcome,
    }
}

/// Convert a status reply into a job snapshot
///
/// `not_found` and unrecognized statuses become error snapshots so that a
/// watch never stalls on a state it does not understand.
fn snapshot(job_id: &str, reply: StatusReply) -> DownloadJob {
    let progress = reply
        .progress
        .filter(|p| p.is_finite())
        .map(|p| p.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0);

    let (status, progress_percent, error_message) = match reply.status.as_str() {
        "queued" => (JobStatus::Queued, progress, None),
        "downloading" => (JobStatus::Downloading, progress, None),
        "completed" => (JobStatus::Completed, 100, None),
        "error" => (
            JobStatus::Error,
            progress,
            Some(
                reply
                    .error
                    .clone()
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "download failed".to_string()),
            ),
        ),
        "not_found" => (
            JobStatus::Error,
            0,
            Some(format!("download {} not found on backend", job_id)),
        ),
        other => (
            JobStatus::Error,
            progress,
            Some(format!("unexpected download status '{}'", other)),
        ),
    };

    DownloadJob {
        download_id: job_id.to_string(),
        status,
        progress_percent,
        error_message,
        filename: reply.filename,
        observed_at: chrono::Utc::now(),
    }
}
