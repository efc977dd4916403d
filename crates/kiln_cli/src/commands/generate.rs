//! Generate command - one chat turn for an application.
//!
//! Display output is written to stdout as it streams in.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use futures::StreamExt;
use tracing::info;

use kiln_core::RequestContext;

use super::runtime::{load_config, Kiln};
use super::GlobalArgs;

#[derive(Args)]
pub struct GenerateArgs {
    /// Application id
    #[arg(short, long)]
    app: i64,

    /// Generation type (html, multi_file, vue_project)
    #[arg(short = 't', long = "type", default_value = "html")]
    generation_type: String,

    /// User id recorded with the request
    #[arg(short, long, default_value_t = 0)]
    user: i64,

    /// Use the structured (non-streaming) path for html and multi_file
    #[arg(long)]
    sync: bool,

    /// The chat message
    #[arg(required = true)]
    prompt: Vec<String>,
}

pub async fn execute(global: &GlobalArgs, args: GenerateArgs) -> Result<()> {
    let config = load_config(global)?;
    let stream_mode = config.generation.stream_mode && !args.sync;
    let kiln = Kiln::connect(config, stream_mode)?;

    let ctx = RequestContext::new(args.user, args.app);
    let prompt = args.prompt.join(" ");
    info!("Generating {} for app {}", args.generation_type, args.app);

    let mut stream = kiln
        .service
        .chat_to_gen_code(&ctx, &prompt, &args.generation_type, false)
        .await
        .context("Generation request failed")?;

    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Generation failed")?;
        write!(stdout, "{}", chunk)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    Ok(())
}
