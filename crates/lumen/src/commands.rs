// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue commands: `add`, `list`, `cancel`, `retry`, `remove`.
//!
//! These attach to the database without crash recovery so they are safe to
//! run next to a live `lumen serve`, which picks up new work on its next poll.

use std::collections::BTreeMap;
use std::sync::Arc;

use lumen_backend::SdCliBackend;
use lumen_bus::EventBus;
use lumen_config::model::LumenConfig;
use lumen_core::{GenerationRequest, JobStatus, LumenError, QueueItem};
use lumen_queue::{QueueProcessor, QueueService};
use lumen_storage::SqliteStorage;

/// Arguments of `lumen add` after parsing.
#[derive(Debug, Clone)]
pub struct AddArgs {
    pub prompt: String,
    pub model: String,
    pub output: Option<String>,
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub seed: Option<i64>,
    pub theme: Option<String>,
    pub template: Option<String>,
    pub values: Vec<String>,
    pub remove_background: bool,
}

/// Open a command-side service. Its processor is never started.
pub async fn open_service(config: &LumenConfig) -> Result<QueueService, LumenError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.attach().await?;
    let storage = Arc::new(storage);
    let backend = Arc::new(SdCliBackend::new(&config.backend, &config.output));
    Ok(QueueService::new(
        QueueProcessor::builder(storage.clone(), storage, backend),
        Arc::new(EventBus::default()),
    ))
}

/// Parse repeated `key=value` template arguments.
pub fn parse_template_values(
    values: &[String],
) -> Result<Option<BTreeMap<String, String>>, LumenError> {
    if values.is_empty() {
        return Ok(None);
    }
    values
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(k, _)| !k.trim().is_empty())
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| LumenError::Config(format!("expected key=value, got `{pair}`")))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()
        .map(Some)
}

pub fn build_request(args: AddArgs, id: &str) -> Result<GenerationRequest, LumenError> {
    if args.prompt.trim().is_empty() {
        return Err(LumenError::Config("prompt must not be empty".into()));
    }
    if args.width == 0 || args.height == 0 || args.steps == 0 {
        return Err(LumenError::Config(
            "width, height and steps must be greater than zero".into(),
        ));
    }
    Ok(GenerationRequest {
        template_values: parse_template_values(&args.values)?,
        prompt: args.prompt,
        negative_prompt: args.negative_prompt,
        model: args.model,
        width: args.width,
        height: args.height,
        steps: args.steps,
        cfg_scale: args.cfg_scale,
        seed: args.seed,
        output_path: args.output.unwrap_or_else(|| format!("{id}.png")),
        theme_id: args.theme,
        template_id: args.template,
        remove_background: args.remove_background,
    })
}

pub async fn run_add(config: &LumenConfig, args: AddArgs, json: bool) -> Result<(), LumenError> {
    let id = uuid::Uuid::new_v4().to_string();
    let request = build_request(args, &id)?;
    let service = open_service(config).await?;
    let item = service.add_with_id(&id, request).await?;
    if json {
        print_json(&item)?;
    } else {
        println!("{id}");
    }
    Ok(())
}

pub async fn run_list(
    config: &LumenConfig,
    status: Option<JobStatus>,
    json: bool,
) -> Result<(), LumenError> {
    let service = open_service(config).await?;
    let items = match status {
        Some(status) => service.list_by_status(status).await?,
        None => service.list().await?,
    };
    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("queue is empty");
        return Ok(());
    }
    for item in &items {
        println!("{}", format_item(item));
    }
    Ok(())
}

/// Which single-item command to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCommand {
    Cancel,
    Retry,
    Remove,
}

impl ItemCommand {
    fn verb(self) -> &'static str {
        match self {
            ItemCommand::Cancel => "cancel",
            ItemCommand::Retry => "retry",
            ItemCommand::Remove => "remove",
        }
    }

    fn applies_to(self) -> &'static str {
        match self {
            ItemCommand::Cancel => "pending",
            ItemCommand::Retry => "failed",
            ItemCommand::Remove => "complete or failed",
        }
    }
}

/// Returns whether the command applied.
pub async fn run_item_command(
    config: &LumenConfig,
    command: ItemCommand,
    id: &str,
) -> Result<bool, LumenError> {
    let service = open_service(config).await?;
    let applied = match command {
        ItemCommand::Cancel => service.cancel(id).await?,
        ItemCommand::Retry => service.retry(id).await?,
        ItemCommand::Remove => service.remove(id).await?,
    };
    if applied {
        println!("{}: {id}", command.verb());
    } else {
        let current = service
            .get(id)
            .await?
            .map(|item| item.status.to_string())
            .unwrap_or_else(|| "not found".into());
        eprintln!(
            "cannot {} {id}: only {} items qualify (current: {current})",
            command.verb(),
            command.applies_to()
        );
    }
    Ok(applied)
}

pub fn format_item(item: &QueueItem) -> String {
    let mut line = format!(
        "{:<36}  {:<10}  {}  {}",
        item.id,
        item.status.as_str(),
        item.created_at,
        item.request.prompt
    );
    if let Some(error) = &item.error {
        line.push_str(&format!("  [{error}]"));
    }
    if let Some(seed) = item.result_seed {
        line.push_str(&format!("  seed={seed}"));
    }
    line
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), LumenError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| LumenError::Internal(format!("failed to serialize output: {e}")))?;
    println!("{json}");
    Ok(())
}
