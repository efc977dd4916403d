//! Check command - run the quality gate over generated output.
//!
//! Reports every rule with its findings, in text or JSON.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use kiln_core::GenerationType;
use kiln_policy::CodeQualityChecker;

#[derive(Args)]
pub struct CheckArgs {
    /// Directory holding the generated code
    dir: PathBuf,

    /// Generation type the directory was produced for
    #[arg(short = 't', long = "type", default_value = "html")]
    generation_type: String,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,
}

pub async fn execute(args: CheckArgs) -> Result<()> {
    let generation_type: GenerationType = args.generation_type.parse()?;
    if !args.dir.is_dir() {
        bail!("Path not found: {}", args.dir.display());
    }
    info!("Running quality gate on {}", args.dir.display());

    let gate = CodeQualityChecker::new()
        .check(generation_type, &args.dir)
        .await
        .context("Failed to run quality gate")?;

    if args.format == "json" {
        let json = serde_json::to_string_pretty(&gate).context("Failed to serialize result")?;
        println!("{}", json);
    } else {
        for detail in &gate.details {
            let mark = if detail.passed { "✓" } else { "✗" };
            match &detail.message {
                Some(message) => println!("  {} {} - {}", mark, detail.check, message),
                None => println!("  {} {}", mark, detail.check),
            }
        }
        for violation in &gate.violations {
            println!("    {:?}: {}", violation.severity, violation.describe());
        }
        if !gate.recommendations.is_empty() {
            println!();
            println!("Recommendations:");
            for rec in &gate.recommendations {
                println!("  - {}", rec);
            }
        }
        println!();
        println!("Score: {:.0}%", gate.score.unwrap_or(0.0));
    }

    if gate.passed {
        println!("✅ Quality gate PASSED");
        Ok(())
    } else {
        bail!("Quality gate failed with {} errors", gate.errors().count())
    }
}
