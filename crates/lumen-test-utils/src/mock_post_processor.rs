// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock background-removal post-processor.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use lumen_core::{AdapterType, HealthStatus, LumenError, PluginAdapter, PostProcessor};

/// Returns `<stem>_transparent.png` next to the input without touching the
/// filesystem, or fails with a fixed message.
pub struct MockPostProcessor {
    failure: Option<String>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockPostProcessor {
    pub fn new() -> Self {
        Self {
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockPostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPostProcessor {
    fn name(&self) -> &str {
        "mock-post-processor"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PostProcessor
    }

    async fn health_check(&self) -> Result<HealthStatus, LumenError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LumenError> {
        Ok(())
    }
}

#[async_trait]
impl PostProcessor for MockPostProcessor {
    async fn remove_background(&self, image: &Path) -> Result<PathBuf, LumenError> {
        self.calls.lock().await.push(image.to_path_buf());
        if let Some(message) = &self.failure {
            return Err(LumenError::PostProcess {
                message: message.clone(),
                source: None,
            });
        }
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(image.with_file_name(format!("{stem}_transparent.png")))
    }
}
