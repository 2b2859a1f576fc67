// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observer interface for queue notifications.

use crate::types::QueueEvent;

/// Fans queue events out to every connected observer.
///
/// Implementations must not block; a slow observer may miss events but
/// never stalls the queue.
pub trait QueueBroadcaster: Send + Sync + 'static {
    fn broadcast(&self, event: &QueueEvent);
}
