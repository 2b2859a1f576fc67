// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lumen serve` command implementation.
//!
//! Opens storage (running crash recovery), wires the stable-diffusion CLI
//! backend and optional background removal into a queue service, logs
//! every queue event, and drains until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use lumen_backend::{RembgPostProcessor, SdCliBackend};
use lumen_bus::EventBus;
use lumen_config::model::LumenConfig;
use lumen_core::{HealthStatus, LumenError, PluginAdapter, QueueEvent, StorageAdapter};
use lumen_queue::{QueueProcessor, QueueService};
use lumen_storage::SqliteStorage;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::shutdown;

/// How long shutdown waits for an in-flight generation.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the `lumen serve` command.
pub async fn run_serve(config: LumenConfig) -> Result<(), LumenError> {
    info!("starting lumen serve");

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage = Arc::new(storage);
    info!(path = %config.storage.database_path, "storage ready");

    let backend = Arc::new(SdCliBackend::new(&config.backend, &config.output));
    report_health(backend.as_ref()).await;

    let bus = Arc::new(EventBus::new(config.queue.event_capacity));
    let cancel = shutdown::install_signal_handler();
    let logger = tokio::spawn(log_events(bus.clone(), cancel.clone()));

    let mut processor = QueueProcessor::builder(storage.clone(), storage.clone(), backend)
        .poll_interval(Duration::from_millis(config.queue.poll_interval_ms));
    if config.postprocess.background_removal {
        let rembg = Arc::new(RembgPostProcessor::new(&config.postprocess));
        report_health(rembg.as_ref()).await;
        processor = processor.post_processor(rembg);
    }
    let service = Arc::new(QueueService::new(processor, bus.clone()));
    shutdown::install_resume_handler(service.clone(), cancel.clone());

    service.start();
    if !config.queue.auto_start {
        service.pause();
        info!("queue.auto_start is off, queue paused (send SIGUSR1 to resume)");
    }
    service.broadcast_status().await?;

    cancel.cancelled().await;

    if !service.shutdown(DRAIN_TIMEOUT).await {
        warn!("exiting with a generation in flight, it will be requeued on next start");
    }
    join_logger(logger).await;
    storage.close().await?;
    info!("lumen serve shutdown complete");
    Ok(())
}

async fn report_health(adapter: &dyn PluginAdapter) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => debug!(adapter = adapter.name(), "adapter healthy"),
        Ok(HealthStatus::Degraded(reason)) | Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(adapter = adapter.name(), %reason, "adapter not ready");
        }
        Err(e) => warn!(adapter = adapter.name(), error = %e, "adapter health check failed"),
    }
}

async fn join_logger(logger: JoinHandle<()>) {
    if let Err(e) = logger.await {
        warn!(error = %e, "event log task ended abnormally");
    }
}

/// Log every bus event until shutdown. Full JSON envelopes go to debug.
async fn log_events(bus: Arc<EventBus>, cancel: CancellationToken) {
    let mut rx = bus.subscribe();
    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(envelope) => envelope,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event log fell behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        match &envelope.event {
            QueueEvent::Progress {
                job_id,
                step,
                total_steps,
                ..
            } => debug!(job_id = %job_id, step, total_steps, "progress"),
            QueueEvent::Complete {
                job_id,
                output_path,
                seed,
            } => info!(job_id = %job_id, output_path = %output_path, seed, "image ready"),
            QueueEvent::QueueStatus(s) => info!(
                pending = s.pending,
                generating = s.generating.as_deref().unwrap_or("-"),
                completed = s.completed,
                failed = s.failed,
                "queue status"
            ),
            _ => {}
        }
        if let Ok(json) = envelope.to_json() {
            debug!(target: "lumen::events", "{json}");
        }
    }
}
