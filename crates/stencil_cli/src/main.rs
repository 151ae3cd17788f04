//! Stencil CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Template error

use std::process::ExitCode;

use clap::Parser;
use stencil_templates::TemplateError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, CliError, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "stencil=debug"
    } else if cli.quiet {
        "stencil=warn"
    } else {
        "stencil=info"
    };
    let mut filter = EnvFilter::from_default_env();
    for directive in [level, "warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr so rendered output on stdout stays clean.
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Params(args) => commands::params::execute(args),
        Commands::Render(args) => commands::render::execute(args),
        Commands::Profiles(args) => commands::profiles::execute(args),
        Commands::Meta(args) => commands::meta::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<CliError>().is_some() {
        return ExitCodes::INVALID_ARGS;
    }
    match e.downcast_ref::<TemplateError>().map(TemplateError::root_cause) {
        Some(TemplateError::InvalidName { .. }) => ExitCodes::VALIDATION_FAILURE,
        Some(_) => ExitCodes::TEMPLATE_ERROR,
        None => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_categorize_error() {
        let invalid = TemplateError::InvalidName {
            name: "h i".into(),
            violations: vec![],
        };
        assert_eq!(
            categorize_error(&anyhow::Error::new(invalid)),
            ExitCodes::VALIDATION_FAILURE
        );

        let missing: Result<(), TemplateError> =
            Err(TemplateError::MissingParameter("X".into()).in_resource("processing", "t", 0));
        let wrapped = missing.context("Failed to render template").unwrap_err();
        assert_eq!(categorize_error(&wrapped), ExitCodes::TEMPLATE_ERROR);

        let arg = anyhow::Error::new(CliError::InvalidKeyValue("nope".into()));
        assert_eq!(categorize_error(&arg), ExitCodes::INVALID_ARGS);

        assert_eq!(categorize_error(&anyhow::anyhow!("io")), ExitCodes::GENERAL_ERROR);
    }
}
