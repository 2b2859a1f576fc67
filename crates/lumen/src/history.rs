// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lumen history` command implementation.

use lumen_config::model::LumenConfig;
use lumen_core::{GenerationRecord, HistoryFilter, LumenError};
use serde::Serialize;

use crate::commands::{open_service, print_json};

#[derive(Debug, Serialize)]
struct HistoryPage {
    total: u64,
    records: Vec<GenerationRecord>,
}

pub async fn run_history(
    config: &LumenConfig,
    filter: HistoryFilter,
    json: bool,
) -> Result<(), LumenError> {
    let service = open_service(config).await?;
    let records = service.history(&filter).await?;
    let total = service.history_count(&filter).await?;

    if json {
        return print_json(&HistoryPage { total, records });
    }
    if records.is_empty() {
        println!("no generations recorded");
        return Ok(());
    }
    for record in &records {
        println!("{}", format_record(record));
    }
    println!("({} of {total})", records.len());
    Ok(())
}

fn format_record(r: &GenerationRecord) -> String {
    let mut line = format!(
        "{}  {}  {}x{}  seed={}  {:.1}s  {}",
        r.created_at,
        r.model,
        r.width,
        r.height,
        r.seed,
        r.generation_time_ms as f64 / 1000.0,
        r.output_path
    );
    if let Some(transparent) = &r.transparent_path {
        line.push_str(&format!("  (+ {transparent})"));
    }
    line
}
