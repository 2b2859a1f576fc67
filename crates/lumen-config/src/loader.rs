// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./lumen.toml` > `~/.config/lumen/lumen.toml` > `/etc/lumen/lumen.toml`
//! with environment variable overrides via `LUMEN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LumenConfig;

/// Top-level config sections, used to map `LUMEN_<SECTION>_<KEY>` env vars.
pub const SECTIONS: &[&str] = &["app", "storage", "queue", "backend", "postprocess", "output"];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/lumen/lumen.toml";
pub(crate) const LOCAL_CONFIG: &str = "lumen.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lumen").join("lumen.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lumen/lumen.toml` (system-wide)
/// 3. `~/.config/lumen/lumen.toml` (user XDG config)
/// 4. `./lumen.toml` (local directory)
/// 5. `LUMEN_*` environment variables
pub fn load_config() -> Result<LumenConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LumenConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LumenConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LumenConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LumenConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LumenConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config key.
///
/// Only the first `_` after a known section name becomes a dot, so
/// `backend_binary_path` maps to `backend.binary_path`. Names that do not
/// start with a known section are returned unchanged.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
            && !rest.is_empty()
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("LUMEN_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("backend_binary_path"), "backend.binary_path");
        assert_eq!(map_env_key("queue_poll_interval_ms"), "queue.poll_interval_ms");
        assert_eq!(
            map_env_key("postprocess_background_removal"),
            "postprocess.background_removal"
        );
        assert_eq!(map_env_key("app_log_level"), "app.log_level");
        assert_eq!(map_env_key("unrelated"), "unrelated");
        assert_eq!(map_env_key("storage_"), "storage_");
    }
}
