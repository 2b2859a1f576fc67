// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans every [`QueueEvent`] out to any number of observers
//! (UI windows, log writers, websocket bridges). Each event is wrapped in an
//! [`Envelope`] carrying a unique id and the time it was published, so
//! transports can deduplicate and order what they forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use lumen_core::{QueueBroadcaster, QueueEvent};

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 256;

/// A published event plus delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub published_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: QueueEvent,
}

impl Envelope {
    pub fn new(event: QueueEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            published_at: Utc::now(),
            event,
        }
    }

    /// Single-line JSON form, suitable for an event log or a socket frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// In-process fan-out event bus.
///
/// When the buffer is full the oldest unconsumed envelopes are dropped and
/// slow receivers observe `RecvError::Lagged`. Publishing never blocks.
pub struct EventBus {
    sender: broadcast::Sender<Envelope>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers that will see it. With no
    /// subscribers the event is dropped.
    pub fn publish(&self, event: QueueEvent) -> usize {
        let envelope = Envelope::new(event);
        match self.sender.send(envelope) {
            Ok(n) => n,
            Err(_) => {
                trace!("event published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl QueueBroadcaster for EventBus {
    fn broadcast(&self, event: &QueueEvent) {
        self.publish(event.clone());
    }
}
