// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Pluggable adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod backend;
pub mod broadcast;
pub mod post_process;
pub mod storage;

pub use adapter::PluginAdapter;
pub use backend::{GenerationBackend, ProgressFn};
pub use broadcast::QueueBroadcaster;
pub use post_process::PostProcessor;
pub use storage::{HistoryStore, JobStore, StorageAdapter};
