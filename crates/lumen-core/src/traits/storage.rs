// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage traits for the job queue and the generation history.

use async_trait::async_trait;

use crate::error::LumenError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    GenerationRecord, GenerationRequest, HistoryFilter, JobStatus, QueueCounts, QueueItem,
    StatusUpdate,
};

/// Adapter for storage and persistence backends.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, crash recovery).
    async fn initialize(&self) -> Result<(), LumenError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), LumenError>;
}

/// Durable table of queue items.
///
/// Lookups of unknown ids return `Ok(None)` or `Ok(false)`. Only I/O and
/// database failures surface as `Err`.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Inserts a new `pending` item with the current timestamp.
    async fn enqueue(&self, id: &str, request: &GenerationRequest)
    -> Result<QueueItem, LumenError>;

    async fn get_job(&self, id: &str) -> Result<Option<QueueItem>, LumenError>;

    /// The oldest `pending` item, ties broken by insertion order.
    async fn next_pending(&self) -> Result<Option<QueueItem>, LumenError>;

    /// Moves an item to `status`, writing only the fields set in `update`.
    ///
    /// Applies only when the current status is a legal predecessor of
    /// `status`. Returns whether a row changed.
    async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        update: StatusUpdate,
    ) -> Result<bool, LumenError>;

    async fn delete_job(&self, id: &str) -> Result<bool, LumenError>;

    /// Deletes the item only if its current status is one of `statuses`.
    async fn delete_if_status(&self, id: &str, statuses: &[JobStatus])
    -> Result<bool, LumenError>;

    /// All items in FIFO order, optionally restricted to one status.
    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<QueueItem>, LumenError>;

    async fn counts_by_status(&self) -> Result<QueueCounts, LumenError>;

    /// Resets a `failed` item to `pending`, clearing timestamps, error and seed.
    async fn reset_to_pending(&self, id: &str) -> Result<bool, LumenError>;
}

/// Durable, insert-only log of completed generations.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    /// Inserts a record. A duplicate id is an error.
    async fn record_generation(&self, record: &GenerationRecord) -> Result<(), LumenError>;

    async fn get_generation(&self, id: &str) -> Result<Option<GenerationRecord>, LumenError>;

    /// Records matching the filter, newest first.
    async fn list_generations(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<GenerationRecord>, LumenError>;

    /// Number of records matching the filter's facets. Paging is ignored.
    async fn count_generations(&self, filter: &HistoryFilter) -> Result<u64, LumenError>;

    async fn delete_generation(&self, id: &str) -> Result<bool, LumenError>;
}
