//! Build command - install and build a generated project.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use kiln_runner::{LoggingStatusSink, NpmProjectBuilder};

use super::runtime::load_config;
use super::GlobalArgs;

#[derive(Args)]
pub struct BuildArgs {
    /// Project directory containing package.json
    dir: PathBuf,

    /// npm executable to use
    #[arg(long, env = "KILN_NPM")]
    npm: Option<String>,
}

pub async fn execute(global: &GlobalArgs, args: BuildArgs) -> Result<()> {
    let config = load_config(global)?;
    let mut builder = NpmProjectBuilder::new(&config.build, Arc::new(LoggingStatusSink));
    if let Some(npm) = args.npm {
        builder = builder.with_program(npm);
    }

    let dist = builder
        .build_project(&args.dir)
        .await
        .with_context(|| format!("Build of {} failed", args.dir.display()))?;

    println!("✅ Build output: {}", dist.display());
    Ok(())
}
