// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end queue testing.
//!
//! `TestHarness` assembles a complete queue stack: temp SQLite storage,
//! a [`MockBackend`], an optional [`MockPostProcessor`], and a
//! [`QueueService`] broadcasting into an [`EventRecorder`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lumen_config::model::StorageConfig;
use lumen_core::{
    GenerationRecord, HistoryStore, JobStatus, JobStore, LumenError, QueueItem, StorageAdapter,
};
use lumen_queue::{QueueProcessor, QueueService};
use lumen_storage::SqliteStorage;

use crate::mock_backend::{Gate, MockBackend, MockOutcome};
use crate::mock_post_processor::MockPostProcessor;
use crate::recorder::EventRecorder;

/// How long `wait_for_*` helpers poll before giving up.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    outcomes: Vec<MockOutcome>,
    default_outcome: Option<MockOutcome>,
    gated: bool,
    progress: bool,
    post_processor: Option<MockPostProcessor>,
    poll_interval: Duration,
    auto_start: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            outcomes: Vec::new(),
            default_outcome: None,
            gated: false,
            progress: false,
            post_processor: None,
            poll_interval: Duration::from_millis(10),
            auto_start: true,
        }
    }

    /// Scripted backend outcomes, consumed in order.
    pub fn with_outcomes(mut self, outcomes: Vec<MockOutcome>) -> Self {
        self.outcomes = outcomes;
        self
    }

    pub fn with_default_outcome(mut self, outcome: MockOutcome) -> Self {
        self.default_outcome = Some(outcome);
        self
    }

    /// Hold each generation until the harness gate is opened.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    pub fn with_post_processor(mut self, post_processor: MockPostProcessor) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    /// Build without starting the processor.
    pub fn stopped(mut self) -> Self {
        self.auto_start = false;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, LumenError> {
        let temp_dir = tempfile::TempDir::new()?;
        let db_path = temp_dir.path().join("lumen.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let mut backend = MockBackend::with_outcomes(self.outcomes);
        if let Some(outcome) = self.default_outcome {
            backend = backend.with_default(outcome);
        }
        if self.progress {
            backend = backend.with_progress();
        }
        let (backend, gate) = if self.gated {
            let (backend, gate) = backend.gated();
            (backend, Some(gate))
        } else {
            (backend, None)
        };
        let backend = Arc::new(backend);

        let events = Arc::new(EventRecorder::new());
        let mut processor =
            QueueProcessor::builder(storage.clone(), storage.clone(), backend.clone())
                .poll_interval(self.poll_interval);
        let post_processor = self.post_processor.map(Arc::new);
        if let Some(post) = &post_processor {
            processor = processor.post_processor(post.clone());
        }
        let service = QueueService::new(processor, events.clone());
        if self.auto_start {
            service.start();
        }

        Ok(TestHarness {
            service,
            storage,
            backend,
            post_processor,
            events,
            gate,
            db_path,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete queue environment with mock adapters and temp storage.
pub struct TestHarness {
    pub service: QueueService,
    /// SQLite storage (temp DB, removed on drop).
    pub storage: Arc<SqliteStorage>,
    pub backend: Arc<MockBackend>,
    pub post_processor: Option<Arc<MockPostProcessor>>,
    pub events: Arc<EventRecorder>,
    /// Present when built with [`TestHarnessBuilder::gated`].
    pub gate: Option<Gate>,
    pub db_path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Let one gated generation finish. No-op for ungated harnesses.
    pub fn release_one(&self) {
        if let Some(gate) = &self.gate {
            gate.open_one();
        }
    }

    /// Poll the store until `id` reaches `status`.
    pub async fn wait_for_status(
        &self,
        id: &str,
        status: JobStatus,
    ) -> Result<QueueItem, LumenError> {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            let item = self.storage.get_job(id).await?;
            if let Some(item) = item.filter(|i| i.status == status) {
                return Ok(item);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LumenError::Internal(format!(
                    "timed out waiting for {id} to become {status}"
                )));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Poll until a history record for `id` exists.
    pub async fn wait_for_generation(&self, id: &str) -> Result<GenerationRecord, LumenError> {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            if let Some(record) = self.storage.get_generation(id).await? {
                return Ok(record);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LumenError::NotFound {
                    kind: "generation".into(),
                    id: id.to_string(),
                });
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Poll until the backend has received `n` calls.
    pub async fn wait_for_calls(&self, n: usize) -> Result<(), LumenError> {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        while self.backend.call_count().await < n {
            if tokio::time::Instant::now() >= deadline {
                return Err(LumenError::Internal(format!(
                    "timed out waiting for {n} backend calls"
                )));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(())
    }
}
