//! Meta command - Describe a template and its resource bodies.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stencil_templates::{parse_template_meta, CAPI_DISPLAY_NAME_ANNOTATION};

use super::{load_template, structured, OutputFormat};

#[derive(Args)]
pub struct MetaArgs {
    /// Template manifest file
    file: PathBuf,

    /// Annotation holding a resource body's display name
    #[arg(long, default_value = CAPI_DISPLAY_NAME_ANNOTATION)]
    display_name_annotation: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    output: OutputFormat,
}

pub fn execute(args: MetaArgs) -> Result<()> {
    let template = load_template(&args.file)?;
    info!(template = template.name(), "Describing template");

    let meta = parse_template_meta(&template, &args.display_name_annotation)
        .with_context(|| format!("Failed to describe template {:?}", template.name()))?;

    if let Some(out) = structured(&meta, args.output)? {
        println!("{}", out.trim_end());
        return Ok(());
    }

    println!("{}", meta.name);
    if !meta.description.is_empty() {
        println!("  {}", meta.description);
    }
    println!();
    println!("Parameters:");
    for param in &meta.params {
        let marker = if param.required { "*" } else { " " };
        println!("  {} {}", marker, param.name);
    }
    println!();
    println!("Objects:");
    for object in &meta.objects {
        let name = if object.display_name.is_empty() {
            &object.name
        } else {
            &object.display_name
        };
        println!("  {}/{} {}", object.api_version, object.kind, name);
        if !object.params.is_empty() {
            println!("    params: {}", object.params.join(", "));
        }
    }

    Ok(())
}
