//! # videomax-client
//!
//! Async client library for the VideoMax download backend.
//!
//! ## Design Philosophy
//!
//! videomax-client is designed to be:
//! - **Presentation-agnostic** - No UI, the library only emits typed [`Event`]s
//! - **Sensible defaults** - Points at `http://localhost:5000` with zero configuration
//! - **Fallback-aware** - Metadata resolution falls back to an alternative provider
//! - **Bounded when asked** - Job watching accepts duration and poll limits plus cancellation
//!
//! ## Quick Start
//!
//! ```no_run
//! use videomax_client::{Config, Event, MediaKind, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = session.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Event::Progress { job } = event {
//!                 println!("{}%", job.progress_percent);
//!             }
//!         }
//!     });
//!
//!     let video = session.analyze("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
//!     println!("{} ({} video formats)", video.metadata.title, video.metadata.formats.video.len());
//!
//!     session.download(MediaKind::Video, 0).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP access to backend endpoints
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Download start requests
pub mod initiator;
/// Job progress polling
pub mod monitor;
/// Two-tier metadata resolution
pub mod resolver;
/// Session orchestration and events
pub mod session;
/// Core types and events
pub mod types;
/// URL validation and video id extraction
pub mod url_tools;
/// Utility functions for saving retrieved files
pub mod utils;

// Re-export commonly used types
pub use client::BackendClient;
pub use config::{BackendConfig, Config, FileCollisionAction, PollingConfig, StorageConfig};
pub use error::{Error, FailureKind, Result};
pub use initiator::DownloadInitiator;
pub use monitor::{ProgressMonitor, WatchEvent, WatchOptions};
pub use resolver::MetadataResolver;
pub use session::{ActiveVideo, DownloadOutcome, Session};
pub use types::{
    DownloadJob, DownloadStart, Event, FormatDescriptor, FormatSet, HealthStatus, JobStatus,
    MediaKind, QualityGroup, SpeedTier, VideoMetadata,
};
pub use url_tools::{extract_video_id, is_valid_url, thumbnail_url};

/// Re-export of the cancellation token accepted by [`WatchOptions`]
pub use tokio_util::sync::CancellationToken;
