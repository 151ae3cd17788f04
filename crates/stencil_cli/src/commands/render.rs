//! Render command - Render a template to a YAML document stream.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{debug, info};

use stencil_templates::{
    in_namespace, inject_labels, inject_prune_annotation, join_documents, stamp_create_request,
    validate_rendered_templates, RenderOpt, TemplateProcessor,
};

use super::{load_template, parse_key_value, CliError};

#[derive(Args)]
pub struct RenderArgs {
    /// Template manifest file
    file: PathBuf,

    /// Parameter value (repeatable), overrides --values
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// YAML file with a mapping of parameter values
    #[arg(long, value_name = "FILE")]
    values: Option<PathBuf>,

    /// Namespace for documents that do not set one
    #[arg(short, long, env = "STENCIL_NAMESPACE")]
    namespace: Option<String>,

    /// Disable pruning of generated resources
    #[arg(long)]
    prune_annotation: bool,

    /// Label added to every document (repeatable)
    #[arg(long = "labels", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    labels: Vec<(String, String)>,

    /// Record the template name and parameter values on the first document
    #[arg(long)]
    stamp_request: bool,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    template: &'a str,
    values: BTreeMap<&'a str, &'a str>,
}

pub fn execute(args: RenderArgs) -> Result<()> {
    let template = load_template(&args.file)?;
    info!(template = template.name(), "Rendering template");

    let mut vars = match &args.values {
        Some(path) => load_values(path)?,
        None => HashMap::new(),
    };
    vars.extend(args.set);
    debug!(count = vars.len(), "Collected parameter values");

    let namespace = args.namespace.map(in_namespace);
    let labels = (!args.labels.is_empty())
        .then(|| inject_labels(args.labels.into_iter().collect()));

    let mut opts: Vec<&dyn RenderOpt> = Vec::new();
    if let Some(opt) = &namespace {
        opts.push(opt);
    }
    if args.prune_annotation {
        opts.push(&inject_prune_annotation);
    }
    if let Some(opt) = &labels {
        opts.push(opt);
    }

    let processor = TemplateProcessor::for_template(&template)?;
    let mut rendered = processor
        .render_templates(&vars, &opts)
        .with_context(|| format!("Failed to render template {:?}", template.name()))?;

    validate_rendered_templates(&rendered)?;

    if args.stamp_request {
        let request = RenderRequest {
            template: template.name(),
            values: vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
        };
        rendered = stamp_create_request(rendered, &request)?;
    }

    let stream = join_documents(&rendered);
    match &args.output {
        Some(path) => {
            std::fs::write(path, &stream)
                .with_context(|| format!("Failed to write output to {:?}", path))?;
            info!("Wrote {} document(s) to {:?}", rendered.len(), path);
        }
        None => std::io::stdout().write_all(&stream)?,
    }

    Ok(())
}

/// Read a YAML mapping of parameter values. Scalars are converted to their
/// text form and `null` becomes the empty string.
fn load_values(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read values file {:?}", path))?;
    let file = path.display().to_string();
    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse values file {:?}", path))?;

    let mapping = match value {
        serde_yaml::Value::Mapping(m) => m,
        serde_yaml::Value::Null => return Ok(HashMap::new()),
        _ => return Err(CliError::InvalidValuesFile(file).into()),
    };

    let mut vars = HashMap::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = scalar_text(&key).ok_or_else(|| CliError::InvalidValuesFile(file.clone()))?;
        let value = scalar_text(&value).ok_or_else(|| CliError::NonScalarValue {
            key: key.clone(),
            file: file.clone(),
        })?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEMPLATE: &str = r#"
metadata:
  name: cluster-template
spec:
  params:
    - name: CLUSTER_NAME
      required: true
  resourcetemplates:
    - apiVersion: v1
      kind: ConfigMap
      metadata:
        name: "${CLUSTER_NAME}-config"
      data:
        replicas: "${REPLICAS:=1}"
"#;

    fn setup(template: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("template.yaml");
        std::fs::write(&file, template).unwrap();
        (dir, file)
    }

    fn replicas(rendered: &str) -> String {
        let doc: serde_yaml::Value = serde_yaml::from_str(rendered).unwrap();
        scalar_text(&doc["data"]["replicas"]).unwrap()
    }

    fn args(file: PathBuf, output: PathBuf) -> RenderArgs {
        RenderArgs {
            file,
            set: vec![],
            values: None,
            namespace: None,
            prune_annotation: false,
            labels: vec![],
            stamp_request: false,
            output: Some(output),
        }
    }

    #[test]
    fn test_render_to_file() {
        let (dir, file) = setup(TEMPLATE);
        let output = dir.path().join("out.yaml");
        let mut args = args(file, output.clone());
        args.set = vec![("CLUSTER_NAME".into(), "dev".into())];
        args.namespace = Some("apps".into());
        args.labels = vec![("team".into(), "platform".into())];

        execute(args).unwrap();

        let rendered = std::fs::read_to_string(&output).unwrap();
        assert!(rendered.contains("name: dev-config"));
        assert!(rendered.contains("namespace: apps"));
        assert!(rendered.contains("team: platform"));
        assert_eq!(replicas(&rendered), "1");
    }

    #[test]
    fn test_set_overrides_values_file() {
        let (dir, file) = setup(TEMPLATE);
        let values = dir.path().join("values.yaml");
        std::fs::write(&values, "CLUSTER_NAME: from-file\nREPLICAS: 3\n").unwrap();
        let output = dir.path().join("out.yaml");
        let mut args = args(file, output.clone());
        args.values = Some(values);
        args.set = vec![("CLUSTER_NAME".into(), "from-flag".into())];

        execute(args).unwrap();

        let rendered = std::fs::read_to_string(&output).unwrap();
        assert!(rendered.contains("name: from-flag-config"));
        assert_eq!(replicas(&rendered), "3");
    }

    #[test]
    fn test_missing_parameter() {
        let (dir, file) = setup(TEMPLATE);
        let err = execute(args(file, dir.path().join("out.yaml"))).unwrap_err();
        let template_err = err.downcast_ref::<stencil_templates::TemplateError>().unwrap();
        assert_eq!(template_err.missing_variable(), Some("CLUSTER_NAME"));
    }

    #[test]
    fn test_invalid_rendered_name() {
        let (dir, file) = setup(TEMPLATE);
        let output = dir.path().join("out.yaml");
        let mut args = args(file, output.clone());
        args.set = vec![("CLUSTER_NAME".into(), "Not Valid".into())];

        let err = execute(args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<stencil_templates::TemplateError>(),
            Some(stencil_templates::TemplateError::InvalidName { .. })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn test_stamp_request() {
        let (dir, file) = setup(TEMPLATE);
        let output = dir.path().join("out.yaml");
        let mut args = args(file, output.clone());
        args.set = vec![("CLUSTER_NAME".into(), "dev".into())];
        args.stamp_request = true;

        execute(args).unwrap();

        let rendered = std::fs::read_to_string(&output).unwrap();
        assert!(rendered.contains(stencil_templates::CREATE_REQUEST_ANNOTATION));
        assert!(rendered.contains("cluster-template"));
    }

    #[test]
    fn test_load_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.yaml");

        std::fs::write(&path, "A: x\nB: 2\nC: true\nD:\n").unwrap();
        let vars = load_values(&path).unwrap();
        assert_eq!(vars["A"], "x");
        assert_eq!(vars["B"], "2");
        assert_eq!(vars["C"], "true");
        assert_eq!(vars["D"], "");

        std::fs::write(&path, "A: [1, 2]\n").unwrap();
        let err = load_values(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::NonScalarValue { .. })
        ));

        std::fs::write(&path, "- a\n").unwrap();
        assert!(load_values(&path).unwrap_err().downcast_ref::<CliError>().is_some());
    }
}
