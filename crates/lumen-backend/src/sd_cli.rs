// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation backend driving a stable-diffusion.cpp style command-line binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use lumen_config::model::{BackendConfig, OutputConfig};
use lumen_core::{
    AdapterType, GenerationBackend, GenerationOutcome, GenerationProgress, GenerationRequest,
    HealthStatus, LumenError, PluginAdapter, ProgressFn,
};

use crate::process::{LineFn, find_program, run_streaming};
use crate::progress::parse_step;

/// Runs one `sd` process per job.
///
/// Invocation: `sd -m <model> -p <prompt> [-n <negative>] -o <output> -W <w> -H <h>
/// --steps <n> --cfg-scale <g> -s <seed> [-t <threads>] [extra args...]`.
pub struct SdCliBackend {
    binary: String,
    models_dir: PathBuf,
    output_dir: OutputConfig,
    threads: Option<u32>,
    extra_args: Vec<String>,
}

impl SdCliBackend {
    pub fn new(config: &BackendConfig, output: &OutputConfig) -> Self {
        Self {
            binary: config.binary_path.clone(),
            models_dir: PathBuf::from(&config.models_dir),
            output_dir: output.clone(),
            threads: config.threads,
            extra_args: config.extra_args.clone(),
        }
    }

    /// Resolve a model identifier: existing paths are used as-is, anything
    /// else is looked up in the models directory.
    pub fn resolve_model(&self, model: &str) -> PathBuf {
        let direct = Path::new(model);
        if direct.is_absolute() || direct.exists() {
            direct.to_path_buf()
        } else {
            self.models_dir.join(model)
        }
    }

    fn build_command(
        &self,
        request: &GenerationRequest,
        model: &Path,
        output: &Path,
        seed: i64,
    ) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-m").arg(model).arg("-p").arg(&request.prompt);
        if let Some(negative) = request.negative_prompt.as_deref().filter(|n| !n.is_empty()) {
            cmd.arg("-n").arg(negative);
        }
        cmd.arg("-o")
            .arg(output)
            .arg("-W")
            .arg(request.width.to_string())
            .arg("-H")
            .arg(request.height.to_string())
            .arg("--steps")
            .arg(request.steps.to_string())
            .arg("--cfg-scale")
            .arg(request.cfg_scale.to_string())
            .arg("-s")
            .arg(seed.to_string());
        if let Some(threads) = self.threads {
            cmd.arg("-t").arg(threads.to_string());
        }
        cmd.args(&self.extra_args);
        cmd
    }
}

/// Turn progress lines into [`GenerationProgress`] reports for one job.
///
/// Only lines counting towards the requested step total are forwarded, and
/// each step is reported once.
fn progress_forwarder(total_steps: u32, on_progress: ProgressFn) -> LineFn {
    let last_step = AtomicU32::new(0);
    Arc::new(move |line: &str| {
        let Some((step, total)) = parse_step(line) else {
            return;
        };
        if total_steps > 0 && total != total_steps {
            return;
        }
        if last_step.fetch_max(step, Ordering::Relaxed) < step {
            on_progress(GenerationProgress::new(step, total));
        }
    })
}

#[async_trait]
impl PluginAdapter for SdCliBackend {
    fn name(&self) -> &str {
        "sd-cli"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }

    async fn health_check(&self) -> Result<HealthStatus, LumenError> {
        if find_program(&self.binary).is_none() {
            return Ok(HealthStatus::Unhealthy(format!(
                "backend binary `{}` not found",
                self.binary
            )));
        }
        if !self.models_dir.is_dir() {
            return Ok(HealthStatus::Degraded(format!(
                "models directory {} does not exist",
                self.models_dir.display()
            )));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LumenError> {
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for SdCliBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
        on_progress: ProgressFn,
    ) -> Result<GenerationOutcome, LumenError> {
        let output = self.output_dir.resolve(&request.output_path);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let model = self.resolve_model(&request.model);
        if !model.exists() {
            return Ok(GenerationOutcome::Failure {
                error: format!("model not found: {}", model.display()),
                generation_time_ms: 0,
            });
        }

        let seed = request
            .seed
            .unwrap_or_else(|| i64::from(rand::random::<u32>()));
        let cmd = self.build_command(request, &model, &output, seed);
        debug!(
            binary = %self.binary,
            model = %model.display(),
            output = %output.display(),
            seed,
            "starting generation process"
        );

        let result =
            run_streaming(cmd, progress_forwarder(request.steps, on_progress)).await?;

        if !result.success() {
            return Ok(GenerationOutcome::Failure {
                error: result.failure_message(&self.binary),
                generation_time_ms: result.duration_ms,
            });
        }

        if !tokio::fs::try_exists(&output).await? {
            return Ok(GenerationOutcome::Failure {
                error: format!("backend finished without writing {}", output.display()),
                generation_time_ms: result.duration_ms,
            });
        }

        info!(
            output = %output.display(),
            duration_ms = result.duration_ms,
            seed,
            "generation process finished"
        );
        Ok(GenerationOutcome::Success {
            output_path: output.to_string_lossy().into_owned(),
            generation_time_ms: result.duration_ms,
            seed: Some(seed),
        })
    }
}
