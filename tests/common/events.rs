//! Event collection helpers

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use videomax_client::Event;

/// Everything buffered on `rx` right now, skipping over lag
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
        }
    }
}

/// Progress percentages carried by `events`, in order
pub fn progress_percents(events: &[Event]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress { job } => Some(job.progress_percent),
            _ => None,
        })
        .collect()
}

/// `serde` type tag of each event, for order assertions
pub fn event_types(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| serde_json::to_value(e).ok())
        .filter_map(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
        .collect()
}
