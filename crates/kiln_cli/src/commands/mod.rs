//! CLI command definitions.
//!
//! Each subcommand maps to one entry point of the generation service.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod agent;
pub mod build;
pub mod check;
pub mod deploy;
pub mod generate;
pub mod history;
pub mod runtime;

/// kiln - conversational front-end code generation
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version, about = "kiln - conversational front-end code generation")]
#[command(long_about = r#"
kiln turns chat messages into front-end code: a single HTML page, an
HTML/CSS/JS triple or a multi-file Vue project written through tools.

COMMANDS:
  generate  → Stream one generation for an application
  agent     → Run the full workflow (enhance, route, generate, check, build)
  history   → Show an application's chat history
  build     → Build a generated Vue project
  deploy    → Copy generated output into the deploy directory
  check     → Run the quality gate over a generated directory

EXIT CODES:
  0 - Success
  1 - General error
  2 - Configuration or invalid request
  3 - Model or upstream failure
  4 - Build or deploy failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// Workspace root holding .kiln/settings.json
    #[arg(short, long, global = true, env = "KILN_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate code for an application from a chat message
    Generate(generate::GenerateArgs),

    /// Run the generation workflow for a prompt
    Agent(agent::AgentArgs),

    /// Show chat history of an application
    History(history::HistoryArgs),

    /// Build a generated project
    Build(build::BuildArgs),

    /// Deploy generated output
    Deploy(deploy::DeployArgs),

    /// Run quality gate checks on generated output
    Check(check::CheckArgs),
}
