//! Deploy command - publish a session's generated output.

use anyhow::{Context, Result};
use clap::Args;

use kiln_core::GenerationType;
use kiln_runner::Deployer;

use super::runtime::load_config;
use super::GlobalArgs;

#[derive(Args)]
pub struct DeployArgs {
    /// Application id
    #[arg(short, long)]
    app: i64,

    /// Generation type (html, multi_file, vue_project)
    #[arg(short = 't', long = "type", default_value = "html")]
    generation_type: String,

    /// Reuse an existing 6-character deploy key
    #[arg(long)]
    key: Option<String>,

    /// Public base URL of the deploy directory
    #[arg(long, env = "KILN_DEPLOY_BASE_URL")]
    base_url: Option<String>,
}

pub async fn execute(global: &GlobalArgs, args: DeployArgs) -> Result<()> {
    let config = load_config(global)?;
    let generation_type: GenerationType = args.generation_type.parse()?;

    let mut deployer = Deployer::new(&config.output_dir, &config.deploy_dir);
    if let Some(base_url) = args.base_url {
        deployer = deployer.with_base_url(base_url);
    }

    let deployment = deployer
        .deploy(generation_type, args.app, args.key.as_deref())
        .await
        .context("Deploy failed")?;

    println!("✅ Deployed with key {}", deployment.deploy_key);
    println!("   Path: {}", deployment.path.display());
    if let Some(url) = deployment.url {
        println!("   URL:  {}", url);
    }
    Ok(())
}
