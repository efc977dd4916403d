//! kiln CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Configuration error or invalid request
//! - 3: Model or upstream failure
//! - 4: Build or deploy failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kiln_chat::ChatError;
use kiln_codegen::CodegenError;
use kiln_core::CoreError;
use kiln_runner::RunnerError;

mod commands;

use commands::{Cli, Commands, GlobalArgs};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const CONFIGURATION: u8 = 2;
    pub const UPSTREAM: u8 = 3;
    pub const BUILD: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let global = cli.global.clone();
    let result = match cli.command {
        Commands::Generate(args) => commands::generate::execute(&global, args).await,
        Commands::Agent(args) => commands::agent::execute(&global, args).await,
        Commands::History(args) => commands::history::execute(&global, args).await,
        Commands::Build(args) => commands::build::execute(&global, args).await,
        Commands::Deploy(args) => commands::deploy::execute(&global, args).await,
        Commands::Check(args) => commands::check::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(global: &GlobalArgs) {
    let default_level = if global.verbose { "kiln=debug" } else { "kiln=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    let log_result = if global.log_json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<ChatError>() {
            return match err {
                ChatError::Config(_) | ChatError::Rejected(_) => ExitCodes::CONFIGURATION,
                ChatError::Model(_) => ExitCodes::UPSTREAM,
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if let Some(err) = cause.downcast_ref::<CodegenError>() {
            return match err {
                CodegenError::Guardrail(_) => ExitCodes::CONFIGURATION,
                err if err.is_configuration() => ExitCodes::CONFIGURATION,
                CodegenError::Model(_) | CodegenError::Tool(_) | CodegenError::ToolLimit(_) => {
                    ExitCodes::UPSTREAM
                }
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if let Some(err) = cause.downcast_ref::<CoreError>() {
            if matches!(
                err,
                CoreError::UnknownGenerationType(_) | CoreError::Config(_) | CoreError::GenerationTypeMissing(_)
            ) {
                return ExitCodes::CONFIGURATION;
            }
        }
        if cause.downcast_ref::<RunnerError>().is_some() {
            return ExitCodes::BUILD;
        }
    }
    ExitCodes::GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes_follow_error_category() {
        let config: anyhow::Error = ChatError::Config("unknown type".into()).into();
        assert_eq!(categorize_error(&config), ExitCodes::CONFIGURATION);

        let upstream = Err::<(), _>(ChatError::Model("503".into()))
            .context("Generation failed")
            .unwrap_err();
        assert_eq!(categorize_error(&upstream), ExitCodes::UPSTREAM);

        let missing: anyhow::Error = CodegenError::ModelNotConfigured("OPENAI_API_KEY".into()).into();
        assert_eq!(categorize_error(&missing), ExitCodes::CONFIGURATION);

        let build: anyhow::Error = RunnerError::Deploy("no source".into()).into();
        assert_eq!(categorize_error(&build), ExitCodes::BUILD);

        assert_eq!(categorize_error(&anyhow::anyhow!("boom")), ExitCodes::GENERAL_ERROR);
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from(["kiln", "--verbose", "generate", "--app", "7", "-t", "multi_file", "a", "pricing", "page"])
            .unwrap();
        assert!(cli.global.verbose);
        assert!(matches!(cli.command, Commands::Generate(_)));
    }
}
