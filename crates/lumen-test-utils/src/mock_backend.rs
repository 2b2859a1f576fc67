// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generation backend for deterministic testing.
//!
//! `MockBackend` implements `GenerationBackend` with scripted outcomes,
//! records every request it receives, and can be gated so a test controls
//! exactly when each generation finishes.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use lumen_core::{
    AdapterType, GenerationBackend, GenerationOutcome, GenerationProgress, GenerationRequest,
    HealthStatus, LumenError, PluginAdapter, ProgressFn,
};

/// Platform error code for "no space left on device".
#[cfg(windows)]
pub const NO_SPACE_CODE: i32 = 112;
#[cfg(not(windows))]
pub const NO_SPACE_CODE: i32 = 28;

/// What the mock does for one `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Report success, writing nothing, with the request's output path.
    Success {
        seed: Option<i64>,
        generation_time_ms: u64,
    },
    /// Report a failure payload.
    Failure(String),
    /// Return an error from the call itself.
    Error {
        message: String,
        os_code: Option<i32>,
    },
}

impl MockOutcome {
    pub fn success(seed: Option<i64>) -> Self {
        MockOutcome::Success {
            seed,
            generation_time_ms: 1200,
        }
    }

    /// An error carrying the platform "no space" code.
    pub fn disk_full() -> Self {
        MockOutcome::Error {
            message: "failed to write image".into(),
            os_code: Some(NO_SPACE_CODE),
        }
    }
}

const OPEN_ALL_PERMITS: usize = 1 << 20;

/// Releases gated generations one at a time.
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    /// Let one waiting (or future) generation finish.
    pub fn open_one(&self) {
        self.permits.add_permits(1);
    }

    /// Let every generation through from now on.
    pub fn open_all(&self) {
        self.permits.add_permits(OPEN_ALL_PERMITS);
    }
}

/// A mock backend returning scripted outcomes.
///
/// Outcomes are popped from a FIFO queue. When the queue is empty the
/// default outcome is used (success with no seed unless configured).
pub struct MockBackend {
    script: Mutex<VecDeque<MockOutcome>>,
    default: MockOutcome,
    calls: Mutex<Vec<GenerationRequest>>,
    emit_progress: bool,
    gate: Option<Gate>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: MockOutcome::success(None),
            calls: Mutex::new(Vec::new()),
            emit_progress: false,
            gate: None,
        }
    }

    pub fn with_outcomes(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(outcomes)),
            ..Self::new()
        }
    }

    /// Outcome used once the script is exhausted.
    pub fn with_default(mut self, outcome: MockOutcome) -> Self {
        self.default = outcome;
        self
    }

    /// Report one progress callback per step before finishing.
    pub fn with_progress(mut self) -> Self {
        self.emit_progress = true;
        self
    }

    /// Block every generation until the returned gate lets it through.
    pub fn gated(mut self) -> (Self, Gate) {
        let gate = Gate {
            permits: Arc::new(Semaphore::new(0)),
        };
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub async fn push_outcome(&self, outcome: MockOutcome) {
        self.script.lock().await.push_back(outcome);
    }

    /// Every request received, in call order.
    pub async fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Output paths of every request received, in call order.
    pub async fn output_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|r| r.output_path.clone())
            .collect()
    }

    async fn next_outcome(&self) -> MockOutcome {
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockBackend {
    fn name(&self) -> &str {
        "mock-backend"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }

    async fn health_check(&self) -> Result<HealthStatus, LumenError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LumenError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
        on_progress: ProgressFn,
    ) -> Result<GenerationOutcome, LumenError> {
        self.calls.lock().await.push(request.clone());
        let outcome = self.next_outcome().await;

        if let Some(gate) = &self.gate {
            gate.permits
                .acquire()
                .await
                .map_err(|e| LumenError::Internal(e.to_string()))?
                .forget();
        }

        if self.emit_progress {
            for step in 1..=request.steps {
                on_progress(GenerationProgress::new(step, request.steps));
            }
        }

        match outcome {
            MockOutcome::Success {
                seed,
                generation_time_ms,
            } => Ok(GenerationOutcome::Success {
                output_path: request.output_path.clone(),
                generation_time_ms,
                seed,
            }),
            MockOutcome::Failure(error) => Ok(GenerationOutcome::Failure {
                error,
                generation_time_ms: 10,
            }),
            MockOutcome::Error { message, os_code } => Err(LumenError::Backend {
                message,
                os_code,
                source: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn request(output: &str, steps: u32) -> GenerationRequest {
        let mut request = crate::sample_request("a fox", output);
        request.steps = steps;
        request
    }

    fn no_progress() -> ProgressFn {
        Arc::new(|_: GenerationProgress| {})
    }

    #[tokio::test]
    async fn scripted_outcomes_then_default() {
        let backend = MockBackend::with_outcomes(vec![
            MockOutcome::success(Some(42)),
            MockOutcome::Failure("bad prompt".into()),
        ]);

        let first = backend.generate(&request("/out/a.png", 4), no_progress()).await.unwrap();
        assert_eq!(
            first,
            GenerationOutcome::Success {
                output_path: "/out/a.png".into(),
                generation_time_ms: 1200,
                seed: Some(42),
            }
        );
        let second = backend.generate(&request("/out/b.png", 4), no_progress()).await.unwrap();
        assert!(matches!(second, GenerationOutcome::Failure { ref error, .. } if error == "bad prompt"));
        let third = backend.generate(&request("/out/c.png", 4), no_progress()).await.unwrap();
        assert!(matches!(third, GenerationOutcome::Success { seed: None, .. }));

        assert_eq!(
            backend.output_paths().await,
            vec!["/out/a.png", "/out/b.png", "/out/c.png"]
        );
    }

    #[tokio::test]
    async fn disk_full_outcome_carries_code() {
        let backend = MockBackend::with_outcomes(vec![MockOutcome::disk_full()]);
        let err = backend
            .generate(&request("/out/a.png", 4), no_progress())
            .await
            .unwrap_err();
        assert_eq!(err.os_code(), Some(NO_SPACE_CODE));
    }

    #[tokio::test]
    async fn progress_reports_every_step() {
        let backend = MockBackend::new().with_progress();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let on_progress: ProgressFn =
            Arc::new(move |p: GenerationProgress| sink.lock().unwrap().push(p.step));

        backend.generate(&request("/out/a.png", 3), on_progress).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn gate_holds_generation_until_opened() {
        let (backend, gate) = MockBackend::new().gated();
        let backend = Arc::new(backend);
        let task = {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move { backend.generate(&request("/out/a.png", 1), no_progress()).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert_eq!(backend.call_count().await, 1);

        gate.open_one();
        assert!(task.await.unwrap().is_ok());
    }
}
