// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation backend trait for image inference engines.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LumenError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationOutcome, GenerationProgress, GenerationRequest};

/// Callback invoked for every step-progress report of a running job.
pub type ProgressFn = Arc<dyn Fn(GenerationProgress) + Send + Sync>;

/// Adapter for an inference engine that turns one request into one image.
///
/// A backend reports an unsuccessful run either as
/// [`GenerationOutcome::Failure`] or as an `Err`; the queue treats both as a
/// job failure. Errors originating in OS calls should carry the raw code in
/// the `os_code` of [`LumenError::Backend`] or arrive as [`LumenError::Io`].
#[async_trait]
pub trait GenerationBackend: PluginAdapter {
    /// Runs one generation to completion.
    async fn generate(
        &self,
        request: &GenerationRequest,
        on_progress: ProgressFn,
    ) -> Result<GenerationOutcome, LumenError>;
}
