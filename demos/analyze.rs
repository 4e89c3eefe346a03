//! Analyze and download example
//!
//! This example demonstrates the core functionality of videomax-client:
//! - Pointing a session at a running backend
//! - Subscribing to events
//! - Resolving a video's metadata and listing its formats
//! - Downloading the best video format and saving the file
//!
//! ```bash
//! VIDEOMAX_BACKEND=http://localhost:5000 RUST_LOG=videomax_client=debug \
//!     cargo run --example analyze -- https://www.youtube.com/watch?v=dQw4w9WgXcQ
//! ```

use std::time::Duration;
use tracing_subscriber::EnvFilter;
use videomax_client::{Config, DownloadOutcome, Event, MediaKind, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let url = std::env::args()
        .nth(1)
        .ok_or("usage: analyze <video url>")?;

    let mut config = match std::env::var("VIDEOMAX_BACKEND") {
        Ok(backend) => Config::with_backend(backend),
        Err(_) => Config::default(),
    };
    // A stuck job should not keep the demo alive forever
    config.polling.max_watch_duration = Some(Duration::from_secs(600));

    let session = Session::new(config)?;

    match session.client().health().await {
        Ok(health) => println!("Backend: {} ({})", health.status, health.message),
        Err(e) => println!("Backend health check failed: {}", e),
    }

    // Subscribe to events
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::AnalysisStarted { url } => println!("🔎 Analyzing {}", url),
                Event::BackendUnreachable => {
                    println!("✗ Backend unreachable. Start the VideoMax server and try again.")
                }
                Event::ResolutionFailed { kind, message } => {
                    println!("✗ Analysis failed ({:?}): {}", kind, message)
                }
                Event::DownloadStarted { job_id } => println!("⬇ Job {} started", job_id),
                Event::Progress { job } => {
                    println!("⬇ {:?} {}%", job.status, job.progress_percent)
                }
                Event::DownloadReady { file_url, .. } => println!("✓ Ready: {}", file_url),
                Event::DownloadFailed { message, .. } => {
                    println!("✗ Download failed: {}", message)
                }
                _ => {}
            }
        }
    });

    let video = session.analyze(&url).await?;
    let metadata = &video.metadata;
    println!(
        "\n{}\n  channel: {}  duration: {}  views: {}",
        metadata.title, metadata.channel, metadata.duration, metadata.views
    );
    if metadata.use_fallback_provider {
        println!("  (resolved through the alternative provider)");
    }

    for group in metadata.formats.video_by_quality() {
        let containers: Vec<&str> = group
            .formats
            .iter()
            .filter_map(|&i| metadata.formats.video.get(i))
            .map(|f| f.container_format.as_str())
            .collect();
        println!(
            "  {:>12}  {:?}  [{}]",
            group.quality,
            group.speed,
            containers.join(", ")
        );
    }
    for format in &metadata.formats.audio {
        println!("  {:>12}  audio  [{}]", format.quality, format.container_format);
    }

    match session.download(MediaKind::Video, 0).await? {
        DownloadOutcome::Direct { url } => println!("\nOpen directly: {}", url),
        DownloadOutcome::Ready { job_id, .. } => {
            let path = session.retrieve_file(&job_id).await?;
            println!("\nSaved to {}", path.display());
        }
    }

    Ok(())
}
