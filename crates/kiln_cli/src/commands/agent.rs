//! Agent command - run the whole workflow for a prompt.
//!
//! Progress lines are printed as stations complete. Build status updates
//! for the application are printed alongside.

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::mpsc;

use kiln_chat::render_workflow_event;
use kiln_core::{GenerationType, RequestContext, WorkflowContext};

use super::runtime::{load_config, Kiln};
use super::GlobalArgs;

#[derive(Args)]
pub struct AgentArgs {
    /// Application id
    #[arg(short, long)]
    app: i64,

    /// Preset generation type; routed from the prompt when absent
    #[arg(short = 't', long = "type")]
    generation_type: Option<String>,

    /// User id recorded with the request
    #[arg(short, long, default_value_t = 0)]
    user: i64,

    /// The prompt
    #[arg(required = true)]
    prompt: Vec<String>,
}

pub async fn execute(global: &GlobalArgs, args: AgentArgs) -> Result<()> {
    let config = load_config(global)?;
    let stream_mode = config.generation.stream_mode;
    let kiln = Kiln::connect(config, stream_mode)?;

    let ctx = RequestContext::new(args.user, args.app);
    let mut context = WorkflowContext::new(ctx, args.prompt.join(" "));
    if let Some(raw) = &args.generation_type {
        let generation_type: GenerationType = raw.parse()?;
        context = context.with_generation_type(generation_type);
    }

    let mut builds = kiln.status.subscribe_app(args.app);
    let build_printer = tokio::spawn(async move {
        while let Some(event) = builds.recv().await {
            println!("  build: {:?}", event.status);
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print!("{}", render_workflow_event(&event));
        }
    });

    let result = kiln.workflow.execute_with_events(context, Some(tx)).await;
    // The sender is gone once the run returns.
    let _ = printer.await;
    build_printer.abort();

    let log = result.context("Workflow failed")?;
    println!();
    println!("Execution {}: {:?}", log.execution_id, log.state);
    println!("  Steps: {}", log.steps.join(" → "));
    if let Some(quality) = &log.context.quality_result {
        println!(
            "  Quality: {} ({} errors)",
            if quality.is_valid { "passed" } else { "failed" },
            quality.errors.len()
        );
    }
    if let Some(dir) = &log.context.build_result_dir {
        println!("  Build: {}", dir.display());
    }
    Ok(())
}
