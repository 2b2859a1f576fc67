// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Lumen configuration system.

use lumen_config::diagnostic::ConfigError;
use lumen_config::model::LumenConfig;
use lumen_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use serial_test::serial;

/// Valid TOML with every known section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_lumen_config() {
    let toml = r#"
[app]
log_level = "debug"

[storage]
database_path = "/tmp/lumen-test.db"
wal_mode = false

[queue]
poll_interval_ms = 250
auto_start = false
event_capacity = 64

[backend]
binary_path = "/opt/sd/bin/sd"
models_dir = "/opt/sd/models"
threads = 8
extra_args = ["--vae-tiling"]

[postprocess]
background_removal = true
binary_path = "/usr/local/bin/rembg"

[output]
directory = "/srv/lumen"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.app.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/lumen-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.queue.poll_interval_ms, 250);
    assert!(!config.queue.auto_start);
    assert_eq!(config.queue.event_capacity, 64);
    assert_eq!(config.backend.binary_path, "/opt/sd/bin/sd");
    assert_eq!(config.backend.models_dir, "/opt/sd/models");
    assert_eq!(config.backend.threads, Some(8));
    assert_eq!(config.backend.extra_args, vec!["--vae-tiling"]);
    assert!(config.postprocess.background_removal);
    assert_eq!(config.postprocess.binary_path, "/usr/local/bin/rembg");
    assert_eq!(config.output.directory, "/srv/lumen");
}

/// Missing optional sections use defaults without error.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    let defaults = LumenConfig::default();
    assert_eq!(config.app.log_level, defaults.app.log_level);
    assert_eq!(config.storage.database_path, defaults.storage.database_path);
    assert_eq!(config.queue.poll_interval_ms, 100);
    assert!(config.queue.auto_start);
}

/// Unknown keys are reported with a "did you mean" suggestion.
#[test]
fn unknown_key_produces_suggestion() {
    let toml = r#"
[queue]
pol_interval_ms = 50
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            ..
        } => {
            assert_eq!(key, "pol_interval_ms");
            assert_eq!(suggestion.as_deref(), Some("poll_interval_ms"));
            assert!(valid_keys.contains("auto_start"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Wrong value types become InvalidType diagnostics naming the dotted key.
#[test]
fn wrong_type_produces_invalid_type() {
    let toml = r#"
[queue]
poll_interval_ms = "fast"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject wrong type");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::InvalidType { key, .. } if key == "queue.poll_interval_ms")
    ));
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_errors_surface_from_str() {
    let toml = r#"
[queue]
poll_interval_ms = 1

[backend]
threads = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// Diagnostics render through miette without panicking.
#[test]
fn diagnostics_render() {
    use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};

    let errors = load_and_validate_str("[app]\nlog_levl = \"info\"\n").unwrap_err();
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    let mut buf = String::new();
    let diagnostic: &dyn Diagnostic = &errors[0];
    handler.render_report(&mut buf, diagnostic).unwrap();
    assert!(buf.contains("log_levl"));
    assert!(buf.contains("did you mean `log_level`?"));
}

/// Figment dot keys override TOML values, which is how env vars land.
#[test]
fn dotted_override_beats_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: LumenConfig = Figment::new()
        .merge(Serialized::defaults(LumenConfig::default()))
        .merge(Toml::string("[backend]\nbinary_path = \"from-toml\"\n"))
        .merge(("backend.binary_path", "from-env"))
        .extract()
        .expect("should merge override");

    assert_eq!(config.backend.binary_path, "from-env");
}

/// `LUMEN_QUEUE_POLL_INTERVAL_MS` maps to `queue.poll_interval_ms`, keeping the
/// underscores inside the key name.
#[test]
#[serial]
fn env_var_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lumen.toml");
    std::fs::write(&path, "[queue]\npoll_interval_ms = 500\n").unwrap();

    // SAFETY: serialized with every other env-mutating test.
    unsafe { std::env::set_var("LUMEN_QUEUE_POLL_INTERVAL_MS", "750") };
    let result = load_and_validate_path(&path);
    unsafe { std::env::remove_var("LUMEN_QUEUE_POLL_INTERVAL_MS") };

    let config = result.expect("config should load");
    assert_eq!(config.queue.poll_interval_ms, 750);
}

#[test]
#[serial]
fn file_values_apply_without_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lumen.toml");
    std::fs::write(&path, "[storage]\ndatabase_path = \"/var/lib/lumen/q.db\"\n").unwrap();

    let config = load_and_validate_path(&path).expect("config should load");
    assert_eq!(config.storage.database_path, "/var/lib/lumen/q.db");
}

/// Missing config files are silently skipped.
#[test]
#[serial]
fn missing_file_is_skipped() {
    let config = load_and_validate_path(std::path::Path::new("/nonexistent/lumen.toml"))
        .expect("missing file should be skipped");
    assert_eq!(config.queue.poll_interval_ms, 100);
}
