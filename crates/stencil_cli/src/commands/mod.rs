//! CLI command definitions.
//!
//! This module defines the command structure for the Stencil CLI.
//! Each subcommand maps to one template operation.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;

use stencil_templates::Template;

pub mod meta;
pub mod params;
pub mod profiles;
pub mod render;

/// Stencil - resource template rendering
#[derive(Parser)]
#[command(name = "stencil")]
#[command(version, about = "Stencil - resource template rendering")]
#[command(long_about = r#"
Stencil discovers parameters in resource templates, renders them with
envsubst or text/template substitution and post-processes the output.

COMMANDS:
  params    → List the parameters a template references
  render    → Render a template to a YAML document stream
  profiles  → List the profiles a template declares
  meta      → Describe a template and its resource bodies

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the parameters a template references
    Params(params::ParamsArgs),

    /// Render a template with parameter values
    Render(render::RenderArgs),

    /// List the profiles declared by a template
    Profiles(profiles::ProfilesArgs),

    /// Describe a template and its resource bodies
    Meta(meta::MetaArgs),
}

/// Errors caused by command-line input rather than by templates.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("expected KEY=VALUE, got {0:?}")]
    InvalidKeyValue(String),

    #[error("value for {key:?} in {file} must be a scalar")]
    NonScalarValue { key: String, file: String },

    #[error("values file {0} must contain a mapping")]
    InvalidValuesFile(String),
}

/// Structured output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

/// Parse a `KEY=VALUE` argument. The value may be empty or contain `=`.
pub fn parse_key_value(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::InvalidKeyValue(s.to_string())),
    }
}

/// Load a template manifest from disk.
pub fn load_template(path: &Path) -> Result<Template> {
    if !path.exists() {
        anyhow::bail!("Template file not found: {:?}", path);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {:?}", path))?;
    let template = Template::from_yaml(&content)
        .with_context(|| format!("Failed to parse template {:?}", path))?;
    tracing::debug!(template = template.name(), "Loaded template");
    Ok(template)
}

/// Serialize `value` as JSON or YAML. Returns `None` for text output.
pub fn structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<Option<String>> {
    match format {
        OutputFormat::Text => Ok(None),
        OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
        OutputFormat::Yaml => Ok(Some(serde_yaml::to_string(value)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("CLUSTER_NAME=dev").unwrap(),
            ("CLUSTER_NAME".to_string(), "dev".to_string())
        );
        assert_eq!(
            parse_key_value("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert_eq!(parse_key_value("EMPTY=").unwrap(), ("EMPTY".to_string(), String::new()));
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_load_template_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_template(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().contains("Template file not found"));
    }

    #[test]
    fn test_structured_output() {
        let value = vec!["a", "b"];
        assert!(structured(&value, OutputFormat::Text).unwrap().is_none());
        assert_eq!(structured(&value, OutputFormat::Yaml).unwrap().unwrap(), "- a\n- b\n");
        assert!(structured(&value, OutputFormat::Json).unwrap().unwrap().contains("\"a\""));
    }
}
