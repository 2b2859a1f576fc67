// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lumen status` command implementation.
//!
//! Prints the aggregate queue counts and the job currently generating.
//! `--json` emits the same snapshot the event bus broadcasts.

use std::io::IsTerminal;

use lumen_config::model::LumenConfig;
use lumen_core::{LumenError, QueueSnapshot};

use crate::commands::{open_service, print_json};

pub async fn run_status(config: &LumenConfig, json: bool, plain: bool) -> Result<(), LumenError> {
    let service = open_service(config).await?;
    let snapshot = service.get_status().await?;
    if json {
        return print_json(&snapshot);
    }
    let use_color = !plain && std::io::stdout().is_terminal();
    print!("{}", render_status(&snapshot, use_color));
    Ok(())
}

fn render_status(s: &QueueSnapshot, use_color: bool) -> String {
    let generating = s.generating.as_deref().unwrap_or("idle");
    let failed = if use_color && s.failed > 0 {
        use colored::Colorize;
        s.failed.to_string().red().to_string()
    } else {
        s.failed.to_string()
    };

    let mut out = String::new();
    out.push('\n');
    out.push_str("  lumen status\n");
    out.push_str(&format!("  {}\n", "-".repeat(35)));
    out.push_str(&format!("    Generating: {generating}\n"));
    out.push_str(&format!("    Pending:    {}\n", s.pending));
    out.push_str(&format!("    Completed:  {}\n", s.completed));
    out.push_str(&format!("    Failed:     {failed}\n"));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_idle_queue() {
        let out = render_status(&QueueSnapshot::default(), false);
        assert!(out.contains("Generating: idle"));
        assert!(out.contains("Pending:    0"));
    }

    #[test]
    fn renders_generating_job() {
        let snapshot = QueueSnapshot {
            pending: 3,
            generating: Some("g1".into()),
            completed: 5,
            failed: 1,
        };
        let out = render_status(&snapshot, false);
        assert!(out.contains("Generating: g1"));
        assert!(out.contains("Pending:    3"));
        assert!(out.contains("Completed:  5"));
        assert!(out.contains("Failed:     1"));
    }

    #[test]
    fn snapshot_json_shape() {
        let json = serde_json::to_value(QueueSnapshot {
            pending: 1,
            generating: None,
            completed: 0,
            failed: 0,
        })
        .unwrap();
        assert_eq!(json["pending"], 1);
        assert!(json["generating"].is_null());
    }
}
