// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths and bounded intervals.

use crate::diagnostic::ConfigError;
use crate::model::LumenConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LumenConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.app.log_level.as_str()) {
        invalid(format!(
            "app.log_level `{}` must be one of {}",
            config.app.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    let poll = config.queue.poll_interval_ms;
    if !(10..=60_000).contains(&poll) {
        invalid(format!(
            "queue.poll_interval_ms must be between 10 and 60000, got {poll}"
        ));
    }

    if config.queue.event_capacity < 16 {
        invalid(format!(
            "queue.event_capacity must be at least 16, got {}",
            config.queue.event_capacity
        ));
    }

    if config.backend.binary_path.trim().is_empty() {
        invalid("backend.binary_path must not be empty".to_string());
    }

    if config.backend.threads == Some(0) {
        invalid("backend.threads must be at least 1 when set".to_string());
    }

    if config.postprocess.background_removal && config.postprocess.binary_path.trim().is_empty() {
        invalid(
            "postprocess.binary_path must not be empty when background_removal is enabled"
                .to_string(),
        );
    }

    if config.output.directory.trim().is_empty() {
        invalid("output.directory must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
