// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Lumen configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LumenConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub app: AppConfig,

    /// Queue and history database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Queue processor settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Inference binary settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Optional post-processing passes.
    #[serde(default)]
    pub postprocess: PostProcessConfig,

    /// Where generated images are written.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn data_path(file: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("lumen").join(file))
        .unwrap_or_else(|| PathBuf::from(file))
        .to_string_lossy()
        .into_owned()
}

fn default_database_path() -> String {
    data_path("lumen.db")
}

fn default_wal_mode() -> bool {
    true
}

/// Queue processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Delay between polls when the queue is idle, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Start the processor as soon as `lumen serve` is up.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Capacity of the event bus ring buffer.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            auto_start: default_auto_start(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_auto_start() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

/// Inference binary configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Path or name of the stable-diffusion CLI executable.
    #[serde(default = "default_backend_binary")]
    pub binary_path: String,

    /// Directory that model identifiers are resolved against.
    #[serde(default = "default_models_dir")]
    pub models_dir: String,

    /// CPU threads passed to the binary. `None` lets it decide.
    #[serde(default)]
    pub threads: Option<u32>,

    /// Extra arguments appended verbatim to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            binary_path: default_backend_binary(),
            models_dir: default_models_dir(),
            threads: None,
            extra_args: Vec::new(),
        }
    }
}

fn default_backend_binary() -> String {
    "sd".to_string()
}

fn default_models_dir() -> String {
    data_path("models")
}

/// Post-processing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PostProcessConfig {
    /// Enable the background-removal pass for requests that ask for it.
    #[serde(default)]
    pub background_removal: bool,

    /// Path or name of the background-removal executable.
    #[serde(default = "default_rembg_binary")]
    pub binary_path: String,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            background_removal: false,
            binary_path: default_rembg_binary(),
        }
    }
}

fn default_rembg_binary() -> String {
    "rembg".to_string()
}

/// Output location configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Base directory for relative output paths.
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

fn default_output_directory() -> String {
    dirs::picture_dir()
        .map(|p| p.join("lumen"))
        .unwrap_or_else(|| PathBuf::from(data_path("output")))
        .to_string_lossy()
        .into_owned()
}

impl OutputConfig {
    /// Resolve a request's output path against the configured directory.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve(&self, output_path: &str) -> PathBuf {
        let path = PathBuf::from(output_path);
        if path.is_absolute() {
            path
        } else {
            PathBuf::from(&self.directory).join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = LumenConfig::default();
        assert_eq!(config.app.log_level, "info");
        assert!(config.storage.database_path.ends_with("lumen.db"));
        assert!(config.storage.wal_mode);
        assert_eq!(config.queue.poll_interval_ms, 100);
        assert!(config.queue.auto_start);
        assert_eq!(config.queue.event_capacity, 256);
        assert_eq!(config.backend.binary_path, "sd");
        assert!(config.backend.threads.is_none());
        assert!(config.backend.extra_args.is_empty());
        assert!(!config.postprocess.background_removal);
        assert_eq!(config.postprocess.binary_path, "rembg");
        assert!(!config.output.directory.is_empty());
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let output = OutputConfig {
            directory: "/srv/images".into(),
        };
        assert_eq!(
            output.resolve("/tmp/a.png"),
            PathBuf::from("/tmp/a.png")
        );
        assert_eq!(
            output.resolve("forest/fox.png"),
            PathBuf::from("/srv/images/forest/fox.png")
        );
    }

    #[test]
    fn unknown_queue_key_is_rejected() {
        let toml_str = r#"
[queue]
poll_interval = 50
"#;
        assert!(toml::from_str::<LumenConfig>(toml_str).is_err());
    }
}
