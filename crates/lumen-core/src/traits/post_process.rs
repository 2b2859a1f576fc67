// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-processing passes applied to a finished image.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::LumenError;
use crate::traits::adapter::PluginAdapter;

/// Adapter for optional passes run after a successful generation.
#[async_trait]
pub trait PostProcessor: PluginAdapter {
    /// Removes the background of `image`, returning the path of the
    /// transparent copy. The source image is left untouched.
    async fn remove_background(&self, image: &Path) -> Result<PathBuf, LumenError>;
}
