// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the generation queue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Backend,
    PostProcessor,
}

/// Current timestamp in the millisecond ISO 8601 form used for every stored time.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

// --- Queue items ---

/// Lifecycle status of a queue item.
///
/// Legal transitions: `pending -> generating -> {complete | failed}`, and
/// `failed -> pending` through an explicit retry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Generating,
    Complete,
    Failed,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Generating,
        JobStatus::Complete,
        JobStatus::Failed,
    ];

    /// The lowercase name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Generating => "generating",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the status is terminal (`complete` or `failed`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Statuses from which a transition into `self` is legal.
    pub fn predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[JobStatus::Failed, JobStatus::Generating],
            JobStatus::Generating => &[JobStatus::Pending],
            JobStatus::Complete | JobStatus::Failed => &[JobStatus::Generating],
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.predecessors().contains(self)
    }
}

/// Immutable snapshot of everything needed to run one generation job.
///
/// Captured at enqueue time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Model identifier, resolved against the backend's model directory.
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    /// Requested seed. `None` lets the backend pick one.
    #[serde(default)]
    pub seed: Option<i64>,
    pub output_path: String,
    #[serde(default)]
    pub theme_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    /// Resolved template variable values, keyed by variable name.
    #[serde(default)]
    pub template_values: Option<BTreeMap<String, String>>,
    /// Run the background-removal pass after a successful generation.
    #[serde(default)]
    pub remove_background: bool,
}

/// A unit of work in the generation queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub status: JobStatus,
    pub request: GenerationRequest,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error: Option<String>,
    pub result_seed: Option<i64>,
}

/// Partial update applied alongside a status transition.
///
/// Only fields set to `Some` are written; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error: Option<String>,
    pub result_seed: Option<i64>,
}

/// Per-status counts plus the id of the in-flight item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub generating: u64,
    pub completed: u64,
    pub failed: u64,
    pub generating_id: Option<String>,
}

/// Aggregate queue status broadcast to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub pending: u64,
    /// Id of the job currently generating, if any.
    pub generating: Option<String>,
    pub completed: u64,
    pub failed: u64,
}

impl From<QueueCounts> for QueueSnapshot {
    fn from(counts: QueueCounts) -> Self {
        Self {
            pending: counts.pending,
            generating: counts.generating_id,
            completed: counts.completed,
            failed: counts.failed,
        }
    }
}

// --- History ---

/// Immutable record of a successfully completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    /// The concrete seed the image was generated with.
    pub seed: i64,
    pub output_path: String,
    /// Set only when the background-removal pass succeeded.
    pub transparent_path: Option<String>,
    pub generation_time_ms: u64,
    pub theme_id: Option<String>,
    pub template_id: Option<String>,
    pub template_values: Option<BTreeMap<String, String>>,
    pub created_at: String,
}

impl GenerationRecord {
    /// Build a history record from a completed request and its resolved results.
    pub fn from_request(
        id: &str,
        request: &GenerationRequest,
        seed: i64,
        output_path: String,
        generation_time_ms: u64,
    ) -> Self {
        Self {
            id: id.to_string(),
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            model: request.model.clone(),
            width: request.width,
            height: request.height,
            steps: request.steps,
            cfg_scale: request.cfg_scale,
            seed,
            output_path,
            transparent_path: None,
            generation_time_ms,
            theme_id: request.theme_id.clone(),
            template_id: request.template_id.clone(),
            template_values: request.template_values.clone(),
            created_at: now_timestamp(),
        }
    }
}

/// Facets for history queries. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub theme_id: Option<String>,
    pub template_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// --- Backend ---

/// One step-progress report from the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationProgress {
    pub step: u32,
    pub total_steps: u32,
    pub percent: f64,
}

impl GenerationProgress {
    /// Build a progress report, deriving the percentage from the step counts.
    pub fn new(step: u32, total_steps: u32) -> Self {
        let percent = if total_steps == 0 {
            0.0
        } else {
            (f64::from(step) / f64::from(total_steps) * 100.0).min(100.0)
        };
        Self {
            step,
            total_steps,
            percent,
        }
    }
}

/// The result reported by a generation backend for one job.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The image was written.
    Success {
        output_path: String,
        generation_time_ms: u64,
        /// Seed the backend actually used, when it reports one.
        seed: Option<i64>,
    },
    /// The backend ran but reported failure.
    Failure {
        error: String,
        generation_time_ms: u64,
    },
}

// --- Notifications ---

/// Notifications emitted by the queue processor and service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum QueueEvent {
    /// A job moved to a new status.
    StatusChange { job_id: String, status: JobStatus },
    /// Step progress for the in-flight job.
    Progress {
        job_id: String,
        step: u32,
        total_steps: u32,
        percent: f64,
    },
    /// A job completed successfully.
    Complete {
        job_id: String,
        output_path: String,
        seed: i64,
    },
    /// A job failed.
    Failed { job_id: String, error: String },
    /// A job failed because storage is exhausted; intake is paused.
    DiskFull { job_id: String },
    /// Aggregate queue status.
    QueueStatus(QueueSnapshot),
}

impl QueueEvent {
    /// The job this event refers to, if it is job-scoped.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            QueueEvent::StatusChange { job_id, .. }
            | QueueEvent::Progress { job_id, .. }
            | QueueEvent::Complete { job_id, .. }
            | QueueEvent::Failed { job_id, .. }
            | QueueEvent::DiskFull { job_id } => Some(job_id),
            QueueEvent::QueueStatus(_) => None,
        }
    }
}
