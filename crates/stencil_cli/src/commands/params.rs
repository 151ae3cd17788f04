//! Params command - List the parameters a template references.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stencil_templates::params_from_template;

use super::{load_template, structured, OutputFormat};

#[derive(Args)]
pub struct ParamsArgs {
    /// Template manifest file
    file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

pub fn execute(args: ParamsArgs) -> Result<()> {
    let template = load_template(&args.file)?;
    info!(template = template.name(), "Discovering template parameters");

    let params = params_from_template(&template)
        .with_context(|| format!("Failed to discover parameters of {:?}", template.name()))?;

    if let Some(out) = structured(&params, args.output)? {
        println!("{}", out.trim_end());
        return Ok(());
    }

    if params.is_empty() {
        println!("No parameters referenced by {}", template.name());
        return Ok(());
    }

    for param in &params {
        let mut line = param.name.clone();
        if param.required {
            line.push_str(" (required)");
        }
        if !param.description.is_empty() {
            line.push_str(&format!(" - {}", param.description));
        }
        if !param.options.is_empty() {
            line.push_str(&format!(" [{}]", param.options.join(", ")));
        }
        println!("{}", line);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_lists_params() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("template.yaml");
        std::fs::write(
            &file,
            r#"
metadata:
  name: t
spec:
  params:
    - name: NAME
      required: true
  resourcetemplates:
    - kind: ConfigMap
      metadata:
        name: "${NAME}"
"#,
        )
        .unwrap();

        execute(ParamsArgs {
            file,
            output: OutputFormat::Json,
        })
        .unwrap();
    }

    #[test]
    fn test_execute_bad_body() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("template.yaml");
        std::fs::write(
            &file,
            r#"
metadata:
  name: t
spec:
  renderType: templating
  resourcetemplates:
    - kind: ConfigMap
      metadata:
        name: "{{ nope .params.NAME }}"
"#,
        )
        .unwrap();

        let err = execute(ParamsArgs {
            file,
            output: OutputFormat::Text,
        })
        .unwrap_err();
        assert!(err.downcast_ref::<stencil_templates::TemplateError>().is_some());
    }
}
