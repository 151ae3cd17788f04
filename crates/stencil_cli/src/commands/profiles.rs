//! Profiles command - List the profiles a template declares.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stencil_templates::get_profiles_from_template;

use super::{load_template, structured, OutputFormat};

#[derive(Args)]
pub struct ProfilesArgs {
    /// Template manifest file
    file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

pub fn execute(args: ProfilesArgs) -> Result<()> {
    let template = load_template(&args.file)?;
    info!(template = template.name(), "Reading template profiles");

    let profiles = get_profiles_from_template(&template)
        .with_context(|| format!("Failed to read profiles of {:?}", template.name()))?;

    if let Some(out) = structured(&profiles, args.output)? {
        println!("{}", out.trim_end());
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No profiles declared by {}", template.name());
        return Ok(());
    }

    let required = profiles.iter().filter(|p| p.required).count();
    println!("{} profile(s), {} required", profiles.len(), required);
    for profile in &profiles {
        let mut line = format!("  {}", profile.name);
        if !profile.version.is_empty() {
            line.push_str(&format!("@{}", profile.version));
        }
        if profile.required {
            line.push_str(" (required)");
        }
        if profile.editable {
            line.push_str(" (editable)");
        }
        if !profile.namespace.is_empty() {
            line.push_str(&format!(" namespace={}", profile.namespace));
        }
        println!("{}", line);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("template.yaml");
        std::fs::write(&file, content).unwrap();
        (dir, file)
    }

    #[test]
    fn test_execute_lists_profiles() {
        let (_dir, file) = write(
            r#"
metadata:
  name: t
  annotations:
    capi.weave.works/profile-0: '{"name": "cert-manager", "version": "2.0.1"}'
"#,
        );
        execute(ProfilesArgs {
            file,
            output: OutputFormat::Text,
        })
        .unwrap();
    }

    #[test]
    fn test_execute_rejects_nameless_profile() {
        let (_dir, file) = write(
            r#"
metadata:
  name: t
  annotations:
    capi.weave.works/profile-0: '{"version": "0.0.8"}'
"#,
        );
        let err = execute(ProfilesArgs {
            file,
            output: OutputFormat::Yaml,
        })
        .unwrap_err();
        assert!(format!("{:#}", err).contains("profile name is required"));
    }
}
