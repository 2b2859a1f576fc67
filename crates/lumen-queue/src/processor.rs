// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The queue processor: a single cooperative worker that drains pending jobs
//! in FIFO order, one at a time.
//!
//! Run-state (`running`, `paused`) lives on the processor instance. The poll
//! loop is a spawned task that sleeps for the poll interval when idle and is
//! woken early by [`QueueProcessor::wake`], `resume` and `stop`. Per-job
//! failures are recorded on the job and never end the loop; only store
//! errors do.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use lumen_core::{
    GenerationBackend, GenerationOutcome, GenerationProgress, GenerationRecord, HistoryStore,
    JobStatus, JobStore, LumenError, PostProcessor, ProgressFn, QueueEvent, QueueItem,
    StatusUpdate, now_timestamp,
};

use crate::classify::{DISK_FULL_MESSAGE, DiskFullClassifier, FailureClass, FailureClassifier};

/// Default delay between polls while the queue is empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Callback receiving every notification the processor emits.
pub type EventFn = Arc<dyn Fn(QueueEvent) + Send + Sync>;

/// Builder for [`QueueProcessor`].
pub struct ProcessorBuilder {
    jobs: Arc<dyn JobStore>,
    history: Arc<dyn HistoryStore>,
    backend: Arc<dyn GenerationBackend>,
    post_processor: Option<Arc<dyn PostProcessor>>,
    classifier: Arc<dyn FailureClassifier>,
    on_event: EventFn,
    poll_interval: Duration,
}

impl ProcessorBuilder {
    pub fn post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn on_event(mut self, on_event: EventFn) -> Self {
        self.on_event = on_event;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn job_store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.jobs)
    }

    pub fn history_store(&self) -> Arc<dyn HistoryStore> {
        Arc::clone(&self.history)
    }

    pub fn build(self) -> QueueProcessor {
        QueueProcessor {
            inner: Arc::new(Inner {
                jobs: self.jobs,
                history: self.history,
                backend: self.backend,
                post_processor: self.post_processor,
                classifier: self.classifier,
                on_event: self.on_event,
                poll_interval: self.poll_interval,
                running: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                in_flight: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                wake: Notify::new(),
            }),
            task: Mutex::new(None),
        }
    }
}

struct Inner {
    jobs: Arc<dyn JobStore>,
    history: Arc<dyn HistoryStore>,
    backend: Arc<dyn GenerationBackend>,
    post_processor: Option<Arc<dyn PostProcessor>>,
    classifier: Arc<dyn FailureClassifier>,
    on_event: EventFn,
    poll_interval: Duration,
    running: AtomicBool,
    paused: AtomicBool,
    in_flight: AtomicBool,
    /// Bumped on every start so a loop from an earlier run exits.
    epoch: AtomicU64,
    wake: Notify,
}

/// Single-worker generation queue processor.
pub struct QueueProcessor {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl QueueProcessor {
    pub fn builder(
        jobs: Arc<dyn JobStore>,
        history: Arc<dyn HistoryStore>,
        backend: Arc<dyn GenerationBackend>,
    ) -> ProcessorBuilder {
        ProcessorBuilder {
            jobs,
            history,
            backend,
            post_processor: None,
            classifier: Arc::new(DiskFullClassifier),
            on_event: Arc::new(|_: QueueEvent| {}),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Start the poll loop. No-op when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.paused.store(false, Ordering::SeqCst);
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = tokio::spawn(run_loop(Arc::clone(&self.inner), epoch));
        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
        info!("queue processor started");
    }

    /// Stop picking up work. A job already in flight still finishes and
    /// records its result. No-op when already stopped.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.wake.notify_one();
        info!("queue processor stopped");
    }

    /// Withhold new work without interrupting the job in flight.
    /// Ignored unless running.
    pub fn pause(&self) {
        if !self.is_running() {
            return;
        }
        if !self.inner.paused.swap(true, Ordering::SeqCst) {
            info!("queue processor paused");
        }
    }

    /// Clear a pause and poll immediately. Ignored unless running and paused.
    pub fn resume(&self) {
        if !self.is_running() {
            return;
        }
        if self.inner.paused.swap(false, Ordering::SeqCst) {
            info!("queue processor resumed");
            self.inner.wake.notify_one();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Whether a job is currently being generated.
    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Poll now instead of waiting for the next interval.
    pub fn wake(&self) {
        self.inner.wake.notify_one();
    }

    /// Stop, then wait up to `timeout` for the loop to finish its current job.
    ///
    /// Returns `false` if the timeout elapsed first; the job then keeps
    /// running detached and is requeued by recovery on the next start.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.stop();
        let handle = self.task.lock().ok().and_then(|mut t| t.take());
        let Some(handle) = handle else {
            return true;
        };
        if self.is_busy() {
            info!("waiting for the in-flight generation to finish");
        }
        match tokio::time::timeout(timeout, handle).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "in-flight generation did not finish before shutdown"
                );
                false
            }
        }
    }
}

impl Drop for QueueProcessor {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }
}

async fn run_loop(inner: Arc<Inner>, epoch: u64) {
    debug!(epoch, "poll loop started");
    while inner.is_current(epoch) {
        if inner.paused.load(Ordering::SeqCst) || inner.in_flight.load(Ordering::SeqCst) {
            inner.idle().await;
            continue;
        }

        let next = match inner.jobs.next_pending().await {
            Ok(next) => next,
            Err(e) => {
                inner.fatal(&e);
                break;
            }
        };
        let Some(item) = next else {
            inner.idle().await;
            continue;
        };

        // stop, pause or a restart may have landed while the fetch was pending.
        if !inner.is_current(epoch) || inner.paused.load(Ordering::SeqCst) {
            debug!(job_id = %item.id, "run state changed during fetch, leaving job pending");
            continue;
        }
        if inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            inner.idle().await;
            continue;
        }
        let result = inner.process(item).await;
        inner.in_flight.store(false, Ordering::SeqCst);
        if let Err(e) = result {
            inner.fatal(&e);
            break;
        }
    }
    debug!(epoch, "poll loop exited");
}

impl Inner {
    fn is_current(&self, epoch: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.epoch.load(Ordering::SeqCst) == epoch
    }

    async fn idle(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {}
            _ = self.wake.notified() => {}
        }
    }

    fn fatal(&self, e: &LumenError) {
        error!(error = %e, "queue store failed, stopping processor");
        self.running.store(false, Ordering::SeqCst);
    }

    fn emit(&self, event: QueueEvent) {
        (self.on_event)(event);
    }

    fn emit_status(&self, job_id: &str, status: JobStatus) {
        self.emit(QueueEvent::StatusChange {
            job_id: job_id.to_string(),
            status,
        });
    }

    fn progress_forwarder(&self, job_id: &str) -> ProgressFn {
        let job_id = job_id.to_string();
        let on_event = Arc::clone(&self.on_event);
        Arc::new(move |p: GenerationProgress| {
            on_event(QueueEvent::Progress {
                job_id: job_id.clone(),
                step: p.step,
                total_steps: p.total_steps,
                percent: p.percent,
            });
        })
    }

    async fn process(&self, item: QueueItem) -> Result<(), LumenError> {
        let id = item.id.as_str();
        let claimed = self
            .jobs
            .update_status(
                id,
                JobStatus::Generating,
                StatusUpdate {
                    started_at: Some(now_timestamp()),
                    ..Default::default()
                },
            )
            .await?;
        if !claimed {
            debug!(job_id = %id, "job left the pending state before it was claimed");
            return Ok(());
        }
        info!(job_id = %id, model = %item.request.model, "generation started");
        self.emit_status(id, JobStatus::Generating);

        let outcome = self
            .backend
            .generate(&item.request, self.progress_forwarder(id))
            .await;

        match outcome {
            Ok(GenerationOutcome::Success {
                output_path,
                generation_time_ms,
                seed,
            }) => {
                let seed = seed.or(item.request.seed).unwrap_or(0);
                self.complete(&item, output_path, generation_time_ms, seed)
                    .await
            }
            Ok(GenerationOutcome::Failure { error, .. }) => {
                let class = self.classifier.classify_message(&error);
                self.fail(id, class, error).await
            }
            Err(e) => {
                let class = self.classifier.classify_error(&e);
                self.fail(id, class, e.to_string()).await
            }
        }
    }

    async fn complete(
        &self,
        item: &QueueItem,
        output_path: String,
        generation_time_ms: u64,
        seed: i64,
    ) -> Result<(), LumenError> {
        let id = item.id.as_str();
        let updated = self
            .jobs
            .update_status(
                id,
                JobStatus::Complete,
                StatusUpdate {
                    completed_at: Some(now_timestamp()),
                    result_seed: Some(seed),
                    ..Default::default()
                },
            )
            .await?;
        if !updated {
            warn!(job_id = %id, "job was no longer generating, discarding result");
            return Ok(());
        }
        info!(job_id = %id, seed, generation_time_ms, "generation complete");
        self.emit_status(id, JobStatus::Complete);
        self.emit(QueueEvent::Complete {
            job_id: id.to_string(),
            output_path: output_path.clone(),
            seed,
        });

        let mut record = GenerationRecord::from_request(
            id,
            &item.request,
            seed,
            output_path,
            generation_time_ms,
        );
        if item.request.remove_background {
            record.transparent_path = self.remove_background(id, &record.output_path).await;
        }
        self.history.record_generation(&record).await
    }

    /// Optional post-processing. Failure is logged and never fails the job.
    async fn remove_background(&self, job_id: &str, image: &str) -> Option<String> {
        let Some(post) = &self.post_processor else {
            debug!(job_id = %job_id, "background removal requested but not enabled");
            return None;
        };
        match post.remove_background(Path::new(image)).await {
            Ok(path) => {
                debug!(job_id = %job_id, path = %path.display(), "background removed");
                Some(path.to_string_lossy().into_owned())
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "background removal failed");
                None
            }
        }
    }

    async fn fail(&self, id: &str, class: FailureClass, error: String) -> Result<(), LumenError> {
        let disk_full = class == FailureClass::DiskFull;
        let message = if disk_full {
            // Pause before the failure becomes visible so no further job
            // starts after an observer sees it.
            self.paused.store(true, Ordering::SeqCst);
            DISK_FULL_MESSAGE.to_string()
        } else {
            error
        };

        self.jobs
            .update_status(
                id,
                JobStatus::Failed,
                StatusUpdate {
                    completed_at: Some(now_timestamp()),
                    error: Some(message.clone()),
                    ..Default::default()
                },
            )
            .await?;
        self.emit_status(id, JobStatus::Failed);
        self.emit(QueueEvent::Failed {
            job_id: id.to_string(),
            error: message.clone(),
        });

        if disk_full {
            warn!(job_id = %id, "disk full, queue paused until resumed");
            self.emit(QueueEvent::DiskFull {
                job_id: id.to_string(),
            });
        } else {
            warn!(job_id = %id, error = %message, "generation failed");
        }
        Ok(())
    }
}
