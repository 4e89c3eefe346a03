//! Per-user session tying resolution, download start and job watching together
//!
//! A [`Session`] owns the backend client and the active video slot, and
//! broadcasts an [`Event`] for every step so a presentation layer can render
//! without being called back directly.

use crate::client::BackendClient;
use crate::config::Config;
use crate::error::{Error, FailureKind, Result};
use crate::initiator::DownloadInitiator;
use crate::monitor::{ProgressMonitor, WatchEvent, WatchOptions};
use crate::resolver::MetadataResolver;
use crate::types::{DownloadStart, Event, JobStatus, MediaKind, VideoMetadata};
use crate::url_tools::is_valid_url;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;

/// The video currently presented to the user
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveVideo {
    /// URL the metadata was resolved from (trimmed)
    pub source_url: String,
    /// Resolved metadata
    pub metadata: VideoMetadata,
}

/// Successful end of [`Session::download`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Backend handed out a link to open immediately
    Direct {
        /// Direct link
        url: String,
    },
    /// Job completed and its file can be retrieved
    Ready {
        /// Backend job id
        job_id: String,
        /// Absolute file retrieval URL
        file_url: String,
        /// Output filename reported by the backend, if any
        filename: Option<String>,
    },
}

/// One user session against the backend (cloneable, all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Session {
    client: Arc<BackendClient>,
    resolver: MetadataResolver,
    initiator: DownloadInitiator,
    monitor: ProgressMonitor,
    config: Arc<Config>,
    active: Arc<RwLock<Option<Arc<ActiveVideo>>>>,
    event_tx: broadcast::Sender<Event>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.client.base_url().as_str())
            .field("subscribers", &self.event_tx.receiver_count())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session from validated configuration
    ///
    /// No request is made here; an unreachable backend only shows up on the
    /// first [`analyze`](Self::analyze).
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let client = Arc::new(BackendClient::new(&config.backend)?);
        let (event_tx, _rx) = broadcast::channel(config.event_buffer);

        Ok(Self {
            resolver: MetadataResolver::new(Arc::clone(&client)),
            initiator: DownloadInitiator::new(Arc::clone(&client)),
            monitor: ProgressMonitor::new(Arc::clone(&client), &config.polling),
            client,
            config: Arc::new(config),
            active: Arc::new(RwLock::new(None)),
            event_tx,
        })
    }

    /// Subscribe to session events
    ///
    /// Each receiver sees every event sent after it subscribed. A receiver
    /// that falls more than `event_buffer` events behind gets
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Session events as a stream
    pub fn events(&self) -> BroadcastStream<Event> {
        BroadcastStream::new(self.subscribe())
    }

    /// Backend client shared by this session
    pub fn client(&self) -> &Arc<BackendClient> {
        &self.client
    }

    /// Session configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The active video, if one has been resolved
    pub async fn current_video(&self) -> Option<Arc<ActiveVideo>> {
        self.active.read().await.clone()
    }

    /// Discard the active video
    pub async fn clear(&self) {
        self.active.write().await.take();
        self.emit(Event::Cleared);
    }

    fn emit(&self, event: Event) {
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Validate `input` and resolve its metadata
    ///
    /// Empty and malformed input fail with [`Error::InvalidInput`] before any
    /// request. On success the active video is replaced as a whole; on
    /// failure the previous one is kept.
    pub async fn analyze(&self, input: &str) -> Result<Arc<ActiveVideo>> {
        let url = input.trim();
        if url.is_empty() {
            return Err(self.reject_input(Error::InvalidInput("empty".to_string())));
        }
        if !is_valid_url(url) {
            return Err(self.reject_input(Error::InvalidInput(format!(
                "malformed URL '{}'",
                url
            ))));
        }

        self.emit(Event::AnalysisStarted {
            url: url.to_string(),
        });

        match self.resolver.resolve(url).await {
            Ok(metadata) => {
                let video = Arc::new(ActiveVideo {
                    source_url: url.to_string(),
                    metadata,
                });
                *self.active.write().await = Some(Arc::clone(&video));
                self.emit(Event::MetadataResolved {
                    metadata: video.metadata.clone(),
                });
                Ok(video)
            }
            Err(Error::BackendUnreachable) => {
                self.emit(Event::BackendUnreachable);
                Err(Error::BackendUnreachable)
            }
            Err(e) => {
                self.emit(Event::ResolutionFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn reject_input(&self, error: Error) -> Error {
        tracing::debug!(error = %error, "rejected input");
        self.emit(Event::ResolutionFailed {
            kind: FailureKind::InvalidInput,
            message: error.to_string(),
        });
        error
    }

    /// Download format `index` of `kind` from the active video
    ///
    /// Uses the configured watch bounds with no cancellation. See
    /// [`download_with`](Self::download_with).
    pub async fn download(&self, kind: MediaKind, index: usize) -> Result<DownloadOutcome> {
        self.download_with(kind, index, WatchOptions::from_config(&self.config.polling))
            .await
    }

    /// Download format `index` of `kind`, watching the job with `options`
    ///
    /// A direct link returns immediately. A job is watched to the end and
    /// every watch event is broadcast; the returned value mirrors the last
    /// one. Concurrent downloads are independent of each other.
    pub async fn download_with(
        &self,
        kind: MediaKind,
        index: usize,
        options: WatchOptions,
    ) -> Result<DownloadOutcome> {
        let video = self
            .current_video()
            .await
            .ok_or_else(|| Error::InvalidInput("no video has been analyzed".to_string()))?;
        let format = video
            .metadata
            .formats
            .get(kind, index)
            .ok_or_else(|| Error::InvalidInput(format!("no {} format at index {}", kind, index)))?;

        self.emit(Event::DownloadRequested {
            kind,
            format_id: format.format_id.clone(),
            quality: format.quality.clone(),
        });

        let start = self
            .initiator
            .start(
                &video.source_url,
                format,
                kind,
                video.metadata.use_fallback_provider,
                video.metadata.fallback_download_url.as_deref(),
            )
            .await;

        let job_id = match start {
            Ok(DownloadStart::Direct(url)) => {
                self.emit(Event::DirectUrlReady { url: url.clone() });
                return Ok(DownloadOutcome::Direct { url });
            }
            Ok(DownloadStart::Job(job_id)) => job_id,
            Err(e) => {
                if e.is_transport() {
                    self.emit(Event::BackendUnreachable);
                }
                self.emit(Event::DownloadFailed {
                    job_id: None,
                    kind: e.kind(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        self.emit(Event::DownloadStarted {
            job_id: job_id.clone(),
        });
        self.follow(job_id, options).await
    }

    async fn follow(&self, job_id: String, options: WatchOptions) -> Result<DownloadOutcome> {
        let mut watch = self.monitor.watch(job_id.clone(), options);

        while let Some(event) = watch.next().await {
            match event {
                WatchEvent::Progress(job) => {
                    let failure = (job.status == JobStatus::Error).then(|| {
                        job.error_message
                            .clone()
                            .unwrap_or_else(|| "download failed".to_string())
                    });
                    self.emit(Event::Progress { job });
                    if let Some(message) = failure {
                        self.emit(Event::DownloadFailed {
                            job_id: Some(job_id.clone()),
                            kind: FailureKind::JobError,
                            message: message.clone(),
                        });
                        return Err(Error::JobFailed { job_id, message });
                    }
                }
                WatchEvent::Ready {
                    job_id,
                    file_url,
                    filename,
                } => {
                    self.emit(Event::DownloadReady {
                        job_id: job_id.clone(),
                        file_url: file_url.clone(),
                    });
                    return Ok(DownloadOutcome::Ready {
                        job_id,
                        file_url,
                        filename,
                    });
                }
                WatchEvent::PollFailed { job_id, message } => {
                    self.emit(Event::PollFailed {
                        job_id: job_id.clone(),
                        message: message.clone(),
                    });
                    return Err(Error::PollFailed { job_id, message });
                }
                WatchEvent::TimedOut {
                    job_id,
                    polls,
                    elapsed,
                } => {
                    self.emit(Event::WatchTimedOut {
                        job_id: job_id.clone(),
                        polls,
                    });
                    return Err(Error::WatchTimedOut {
                        job_id,
                        polls,
                        elapsed,
                    });
                }
                WatchEvent::Cancelled { job_id } => {
                    self.emit(Event::WatchCancelled {
                        job_id: job_id.clone(),
                    });
                    return Err(Error::WatchCancelled { job_id });
                }
            }
        }

        // every watch ends with a terminal event
        Err(Error::PollFailed {
            job_id,
            message: "watch ended without a terminal state".to_string(),
        })
    }

    /// Save a completed job's file into the configured download directory
    pub async fn retrieve_file(&self, job_id: &str) -> Result<PathBuf> {
        self.client
            .download_file(
                job_id,
                &self.config.storage.download_dir,
                self.config.storage.file_collision,
            )
            .await
    }
}
