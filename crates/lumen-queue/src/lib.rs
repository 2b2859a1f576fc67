// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent single-worker generation queue.
//!
//! - [`QueueProcessor`] drains pending jobs one at a time in FIFO order and
//!   pauses itself when a generation fails because the disk is full.
//! - [`QueueService`] is the command surface (add, cancel, retry, remove)
//!   that broadcasts notifications to observers.
//! - [`FailureClassifier`] decides which failures trip the disk-full pause.

pub mod classify;
pub mod processor;
pub mod service;

pub use classify::{DISK_FULL_MESSAGE, DiskFullClassifier, FailureClass, FailureClassifier};
pub use processor::{DEFAULT_POLL_INTERVAL, EventFn, ProcessorBuilder, QueueProcessor};
pub use service::QueueService;
