// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types live in `lumen-core::types` so they can cross adapter
//! trait boundaries. This module re-exports them for use within the crate.

pub use lumen_core::types::{
    GenerationRecord, GenerationRequest, HistoryFilter, JobStatus, QueueCounts, QueueItem,
    StatusUpdate,
};
