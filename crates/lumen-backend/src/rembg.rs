// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background removal through the `rembg` command-line tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use lumen_config::model::PostProcessConfig;
use lumen_core::{AdapterType, HealthStatus, LumenError, PluginAdapter, PostProcessor};

use crate::process::{find_program, run_streaming};

/// Path of the transparent copy written next to `image`: `<stem>_transparent.png`.
pub fn transparent_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    image.with_file_name(format!("{stem}_transparent.png"))
}

/// Runs `rembg i <input> <output>` for each image.
pub struct RembgPostProcessor {
    binary: String,
}

impl RembgPostProcessor {
    pub fn new(config: &PostProcessConfig) -> Self {
        Self {
            binary: config.binary_path.clone(),
        }
    }
}

fn post_error(message: String) -> LumenError {
    LumenError::PostProcess {
        message,
        source: None,
    }
}

#[async_trait]
impl PluginAdapter for RembgPostProcessor {
    fn name(&self) -> &str {
        "rembg"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PostProcessor
    }

    async fn health_check(&self) -> Result<HealthStatus, LumenError> {
        Ok(match find_program(&self.binary) {
            Some(_) => HealthStatus::Healthy,
            None => HealthStatus::Unhealthy(format!("`{}` not found", self.binary)),
        })
    }

    async fn shutdown(&self) -> Result<(), LumenError> {
        Ok(())
    }
}

#[async_trait]
impl PostProcessor for RembgPostProcessor {
    async fn remove_background(&self, image: &Path) -> Result<PathBuf, LumenError> {
        let output = transparent_path(image);
        let mut cmd = Command::new(&self.binary);
        cmd.arg("i").arg(image).arg(&output);

        let result = run_streaming(cmd, Arc::new(|_: &str| {})).await?;
        if !result.success() {
            return Err(post_error(result.failure_message(&self.binary)));
        }
        if !tokio::fs::try_exists(&output).await? {
            return Err(post_error(format!(
                "{} finished without writing {}",
                self.binary,
                output.display()
            )));
        }

        debug!(output = %output.display(), duration_ms = result.duration_ms, "background removed");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_path_sits_next_to_image() {
        assert_eq!(
            transparent_path(Path::new("/out/forest/fox.png")),
            PathBuf::from("/out/forest/fox_transparent.png")
        );
        assert_eq!(
            transparent_path(Path::new("owl.jpg")),
            PathBuf::from("owl_transparent.png")
        );
    }

    #[cfg(unix)]
    mod fake_binary {
        use super::*;
        use serial_test::serial;
        use std::os::unix::fs::PermissionsExt;

        fn install(dir: &Path, script: &str) -> RembgPostProcessor {
            let path = dir.join("fake-rembg");
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            RembgPostProcessor::new(&PostProcessConfig {
                background_removal: true,
                binary_path: path.to_string_lossy().into_owned(),
            })
        }

        #[tokio::test]
        #[serial]
        async fn writes_transparent_copy() {
            let dir = tempfile::tempdir().unwrap();
            let rembg = install(dir.path(), "#!/bin/sh\ncp \"$2\" \"$3\"\n");
            let image = dir.path().join("fox.png");
            std::fs::write(&image, b"png").unwrap();

            let out = rembg.remove_background(&image).await.unwrap();
            assert_eq!(out, dir.path().join("fox_transparent.png"));
            assert_eq!(std::fs::read(&out).unwrap(), b"png");
            assert!(image.exists(), "source image is kept");
        }

        #[tokio::test]
        #[serial]
        async fn failure_is_post_process_error() {
            let dir = tempfile::tempdir().unwrap();
            let rembg = install(dir.path(), "#!/bin/sh\necho 'onnx model missing' >&2\nexit 1\n");
            let image = dir.path().join("fox.png");
            std::fs::write(&image, b"png").unwrap();

            let err = rembg.remove_background(&image).await.unwrap_err();
            assert!(
                matches!(err, LumenError::PostProcess { ref message, .. } if message == "onnx model missing")
            );
        }
    }
}
