// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue service: the command surface used by front ends.
//!
//! Wraps a [`QueueProcessor`], forwards its notifications to a
//! [`QueueBroadcaster`] and re-broadcasts an aggregate [`QueueSnapshot`]
//! after every command and every job status change. Commands that may not
//! apply to an item's current state return `Ok(false)` instead of an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use lumen_core::{
    GenerationRecord, GenerationRequest, HistoryFilter, HistoryStore, JobStatus, JobStore,
    LumenError, QueueBroadcaster, QueueEvent, QueueItem, QueueSnapshot,
};

use crate::processor::{ProcessorBuilder, QueueProcessor};

pub struct QueueService {
    jobs: Arc<dyn JobStore>,
    history: Arc<dyn HistoryStore>,
    broadcaster: Arc<dyn QueueBroadcaster>,
    /// Held across each counts read and its broadcast, so snapshots go out
    /// in the order they were read and the last one is never stale.
    snapshot_lock: Arc<Mutex<()>>,
    processor: QueueProcessor,
}

impl QueueService {
    /// Build the service around a configured processor.
    ///
    /// Any event callback already set on `processor` is replaced by the
    /// service's forwarder.
    pub fn new(processor: ProcessorBuilder, broadcaster: Arc<dyn QueueBroadcaster>) -> Self {
        let jobs = processor.job_store();
        let history = processor.history_store();
        let snapshot_lock = Arc::new(Mutex::new(()));
        let forward = {
            let jobs = Arc::clone(&jobs);
            let broadcaster = Arc::clone(&broadcaster);
            let lock = Arc::clone(&snapshot_lock);
            Arc::new(move |event: QueueEvent| {
                broadcaster.broadcast(&event);
                if matches!(event, QueueEvent::StatusChange { .. }) {
                    spawn_snapshot(
                        Arc::clone(&jobs),
                        Arc::clone(&broadcaster),
                        Arc::clone(&lock),
                    );
                }
            })
        };
        let processor = processor.on_event(forward).build();
        Self {
            jobs,
            history,
            broadcaster,
            snapshot_lock,
            processor,
        }
    }

    /// Enqueue a request under a fresh id and return the id.
    pub async fn add(&self, request: GenerationRequest) -> Result<String, LumenError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.add_with_id(&id, request).await?;
        Ok(id)
    }

    /// Enqueue a request under a caller-chosen id.
    ///
    /// An id still in the queue, or one that already has a history record
    /// (a finished job that was removed from the list), is rejected with
    /// [`LumenError::AlreadyExists`].
    pub async fn add_with_id(
        &self,
        id: &str,
        request: GenerationRequest,
    ) -> Result<QueueItem, LumenError> {
        if self.history.get_generation(id).await?.is_some() {
            return Err(LumenError::AlreadyExists {
                kind: "generation".into(),
                id: id.to_string(),
            });
        }
        let item = self.jobs.enqueue(id, &request).await?;
        info!(job_id = %id, model = %request.model, "generation queued");
        self.broadcast_status().await?;
        self.processor.wake();
        Ok(item)
    }

    /// Delete a pending item. In-flight and finished items are untouched.
    pub async fn cancel(&self, id: &str) -> Result<bool, LumenError> {
        let deleted = self
            .jobs
            .delete_if_status(id, &[JobStatus::Pending])
            .await?;
        self.after_command("cancel", id, deleted).await?;
        Ok(deleted)
    }

    /// Delete a finished (complete or failed) item from the queue list.
    /// Its history record, if any, is kept.
    pub async fn remove(&self, id: &str) -> Result<bool, LumenError> {
        let finished: Vec<JobStatus> = JobStatus::ALL
            .into_iter()
            .filter(JobStatus::is_terminal)
            .collect();
        let deleted = self.jobs.delete_if_status(id, &finished).await?;
        self.after_command("remove", id, deleted).await?;
        Ok(deleted)
    }

    /// Send a failed item back to the queue.
    pub async fn retry(&self, id: &str) -> Result<bool, LumenError> {
        // Only a finished job that may return to pending, i.e. a failed one.
        // A generating job may also go back to pending, but only via recovery.
        let retryable = self.jobs.get_job(id).await?.is_some_and(|item| {
            item.status.is_terminal() && item.status.can_transition_to(JobStatus::Pending)
        });
        let reset = retryable && self.jobs.reset_to_pending(id).await?;
        self.after_command("retry", id, reset).await?;
        if reset {
            self.processor.wake();
        }
        Ok(reset)
    }

    async fn after_command(&self, command: &str, id: &str, applied: bool) -> Result<(), LumenError> {
        if !applied {
            debug!(job_id = %id, command, "command did not apply");
            return Ok(());
        }
        info!(job_id = %id, command, "queue command applied");
        self.broadcast_status().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<QueueItem>, LumenError> {
        self.jobs.get_job(id).await
    }

    /// Every queue item in FIFO order.
    pub async fn list(&self) -> Result<Vec<QueueItem>, LumenError> {
        self.jobs.list_jobs(None).await
    }

    pub async fn list_by_status(&self, status: JobStatus) -> Result<Vec<QueueItem>, LumenError> {
        self.jobs.list_jobs(Some(status)).await
    }

    pub async fn get_status(&self) -> Result<QueueSnapshot, LumenError> {
        Ok(self.jobs.counts_by_status().await?.into())
    }

    pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<GenerationRecord>, LumenError> {
        self.history.list_generations(filter).await
    }

    pub async fn history_count(&self, filter: &HistoryFilter) -> Result<u64, LumenError> {
        self.history.count_generations(filter).await
    }

    pub async fn get_generation(&self, id: &str) -> Result<Option<GenerationRecord>, LumenError> {
        self.history.get_generation(id).await
    }

    /// Publish the current aggregate counts.
    pub async fn broadcast_status(&self) -> Result<(), LumenError> {
        let _guard = self.snapshot_lock.lock().await;
        let snapshot = self.get_status().await?;
        self.broadcaster.broadcast(&QueueEvent::QueueStatus(snapshot));
        Ok(())
    }

    pub fn start(&self) {
        self.processor.start();
    }

    pub fn stop(&self) {
        self.processor.stop();
    }

    pub fn pause(&self) {
        self.processor.pause();
    }

    pub fn resume(&self) {
        self.processor.resume();
    }

    pub fn is_running(&self) -> bool {
        self.processor.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.processor.is_paused()
    }

    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.processor.shutdown(timeout).await
    }

    pub fn processor(&self) -> &QueueProcessor {
        &self.processor
    }
}

fn spawn_snapshot(
    jobs: Arc<dyn JobStore>,
    broadcaster: Arc<dyn QueueBroadcaster>,
    lock: Arc<Mutex<()>>,
) {
    tokio::spawn(async move {
        let _guard = lock.lock().await;
        match jobs.counts_by_status().await {
            Ok(counts) => broadcaster.broadcast(&QueueEvent::QueueStatus(counts.into())),
            Err(e) => warn!(error = %e, "could not read queue counts for broadcast"),
        }
    });
}
