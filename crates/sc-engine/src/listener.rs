//! In-process event listeners.
//!
//! Local observers (notification badges, audit projections) can watch the
//! event stream without registering an HTTP webhook. Each subscription is an
//! owned handle; there is no process-global channel, and dropping or closing
//! a handle ends only that subscription.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// A published event as seen by in-process listeners.
#[derive(Debug, Clone)]
pub struct EventNotice {
    pub event_type: String,
    pub company_id: Option<String>,
    pub data: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

/// Fan-out side. One per broadcaster.
#[derive(Clone)]
pub(crate) struct EventNotifier {
    tx: broadcast::Sender<EventNotice>,
}

impl EventNotifier {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish a notice to whoever is listening. A send with no listeners is
    /// not an error.
    pub(crate) fn notify(&self, notice: EventNotice) {
        let _ = self.tx.send(notice);
    }

    pub(crate) fn subscribe(&self) -> EventListener {
        EventListener {
            rx: self.tx.subscribe(),
        }
    }
}

/// An owned subscription handle. Receives every event published after the
/// handle was created, until it is closed or dropped.
pub struct EventListener {
    rx: broadcast::Receiver<EventNotice>,
}

impl EventListener {
    /// Next notice, or `None` once the broadcaster is gone. A slow listener
    /// that lags behind the channel capacity skips the overwritten notices
    /// and keeps going.
    pub async fn recv(&mut self) -> Option<EventNotice> {
        loop {
            match self.rx.recv().await {
                Ok(notice) => return Some(notice),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event listener lagged; notices dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Explicitly end this subscription.
    pub fn close(self) {
        drop(self);
    }
}
