// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcaster that records every event for later assertions.

use std::sync::Mutex;
use std::time::Duration;

use lumen_core::{QueueBroadcaster, QueueEvent};

#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<QueueEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events about one job, in emission order, excluding queue snapshots.
    pub fn events_for(&self, job_id: &str) -> Vec<QueueEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.job_id() == Some(job_id))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// Poll until an event matching `pred` has been recorded.
    pub async fn wait_for(&self, timeout: Duration, pred: impl Fn(&QueueEvent) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.events().iter().any(&pred) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl QueueBroadcaster for EventRecorder {
    fn broadcast(&self, event: &QueueEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
