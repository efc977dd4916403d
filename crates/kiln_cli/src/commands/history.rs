//! History command - print an application's chat history.

use anyhow::{Context, Result};
use clap::Args;

use kiln_chat::{Actor, ChatHistory, EntryKind, HistoryStores};

use super::runtime::load_config;
use super::GlobalArgs;

#[derive(Args)]
pub struct HistoryArgs {
    /// Application id
    #[arg(short, long)]
    app: i64,

    /// Number of most recent entries to show
    #[arg(short, long, default_value_t = 20)]
    limit: usize,

    /// Show the replay transcript (tool turns included) instead
    #[arg(long)]
    replay: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,
}

pub async fn execute(global: &GlobalArgs, args: HistoryArgs) -> Result<()> {
    let config = load_config(global)?;
    let stores = HistoryStores::jsonl(config.history_dir());
    let store = if args.replay { &stores.replay } else { &stores.display };

    let entries = store
        .load_recent(args.app, args.limit)
        .await
        .context("Failed to read chat history")?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No history for app {}", args.app);
        return Ok(());
    }
    for entry in entries {
        let speaker = match (entry.actor, entry.kind) {
            (Actor::User, _) => "user",
            (Actor::Assistant, EntryKind::Plain) => "assistant",
            (Actor::Assistant, EntryKind::ToolRequest) => "tool request",
            (Actor::Assistant, EntryKind::ToolResult) => "tool result",
        };
        println!("[{}] {}:", entry.created_at.format("%Y-%m-%d %H:%M:%S"), speaker);
        println!("{}", entry.text);
        println!();
    }
    Ok(())
}
