//! Render-type dispatch and whole-template operations.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use tracing::debug;

use crate::envsubst::EnvsubstProcessor;
use crate::error::{TemplateError, TemplateResult};
use crate::manifest::{RenderType, Template, TemplateSpec};
use crate::params::{merge_params, Param};
use crate::render::{process_document, RenderOpt};
use crate::templating::TextTemplateProcessor;

/// One substitution language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    Envsubst(EnvsubstProcessor),
    Templating(TextTemplateProcessor),
}

impl Processor {
    /// Select the processor for a render type. Unknown render types are a
    /// configuration error.
    pub fn for_render_type(render_type: &RenderType) -> TemplateResult<Self> {
        match render_type {
            RenderType::Envsubst => Ok(Processor::Envsubst(EnvsubstProcessor::new())),
            RenderType::Templating => Ok(Processor::Templating(TextTemplateProcessor::new())),
            RenderType::Unknown(other) => Err(TemplateError::UnknownRenderType(other.clone())),
        }
    }

    pub fn render_type(&self) -> RenderType {
        match self {
            Processor::Envsubst(_) => RenderType::Envsubst,
            Processor::Templating(_) => RenderType::Templating,
        }
    }

    /// Sorted, de-duplicated parameter names referenced by one body.
    pub fn param_names(&self, body: &str) -> TemplateResult<Vec<String>> {
        match self {
            Processor::Envsubst(p) => p.param_names(body),
            Processor::Templating(p) => p.param_names(body),
        }
    }

    /// Substitute `values` into one body. `name` identifies the template in
    /// error messages.
    pub fn render(&self, name: &str, body: &str, values: &HashMap<String, String>) -> TemplateResult<String> {
        match self {
            Processor::Envsubst(p) => p.render(body, values),
            Processor::Templating(p) => p.render(name, body, values),
        }
    }
}

/// Serialize a resource body to the text the processors operate on.
pub fn body_to_text(body: &Value) -> TemplateResult<String> {
    Ok(serde_yaml::to_string(body)?)
}

/// A template paired with the processor selected for its render type.
///
/// The same processor is used for parameter discovery and rendering so that
/// both agree on the grammar.
#[derive(Debug, Clone, Copy)]
pub struct TemplateProcessor<'a> {
    name: &'a str,
    spec: &'a TemplateSpec,
    processor: Processor,
}

impl<'a> TemplateProcessor<'a> {
    pub fn for_template(template: &'a Template) -> TemplateResult<Self> {
        Self::for_spec(template.name(), &template.spec)
    }

    /// Select a processor for a bare spec. `name` is only used in messages.
    pub fn for_spec(name: &'a str, spec: &'a TemplateSpec) -> TemplateResult<Self> {
        let processor = Processor::for_render_type(&spec.render_type)?;
        debug!(template = name, render_type = %spec.render_type, "Selected template processor");
        Ok(Self { name, spec, processor })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn spec(&self) -> &TemplateSpec {
        self.spec
    }

    pub fn processor(&self) -> Processor {
        self.processor
    }

    /// Parameter names referenced by one resource body.
    pub fn param_names(&self, body: &Value) -> TemplateResult<Vec<String>> {
        self.processor.param_names(&body_to_text(body)?)
    }

    /// Union of the parameter names of every resource body, sorted.
    pub fn all_param_names(&self) -> TemplateResult<Vec<String>> {
        let mut names = BTreeSet::new();
        for (index, body) in self.spec.resource_templates.iter().enumerate() {
            let found = self
                .param_names(body)
                .map_err(|e| e.in_resource("getting params from", self.name, index))?;
            names.extend(found);
        }
        Ok(names.into_iter().collect())
    }

    /// Discovered parameters enriched with their declared metadata.
    pub fn params(&self) -> TemplateResult<Vec<Param>> {
        Ok(merge_params(self.all_param_names()?, &self.spec.params))
    }

    /// Render every resource body with `vars`, applying `opts` in order to
    /// each decoded document. Output order matches the resource bodies.
    pub fn render_templates(
        &self,
        vars: &HashMap<String, String>,
        opts: &[&dyn RenderOpt],
    ) -> TemplateResult<Vec<Vec<u8>>> {
        let mut processed = Vec::with_capacity(self.spec.resource_templates.len());
        for (index, body) in self.spec.resource_templates.iter().enumerate() {
            debug!(template = self.name, index, "Rendering resource template");
            let data = body_to_text(body)
                .and_then(|text| self.processor.render(self.name, &text, vars))
                .map_err(|e| e.in_resource("processing", self.name, index))?;
            let data = process_document(data.as_bytes(), opts)
                .map_err(|e| e.in_resource("modifying", self.name, index))?;
            processed.push(data);
        }
        debug!(template = self.name, count = processed.len(), "Rendered resource templates");
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::in_namespace;

    fn template(yaml: &str) -> Template {
        Template::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_processor_selection() {
        assert_eq!(
            Processor::for_render_type(&RenderType::Envsubst).unwrap().render_type(),
            RenderType::Envsubst
        );
        assert_eq!(
            Processor::for_render_type(&RenderType::from("")).unwrap().render_type(),
            RenderType::Envsubst
        );
        assert_eq!(
            Processor::for_render_type(&RenderType::Templating).unwrap().render_type(),
            RenderType::Templating
        );
        let err = Processor::for_render_type(&RenderType::from("mustache")).unwrap_err();
        assert_eq!(err.to_string(), "unknown template renderType: mustache");
    }

    #[test]
    fn test_all_param_names_unions_bodies() {
        let t = template(
            r#"
metadata:
  name: cluster-template
spec:
  resourcetemplates:
    - kind: Cluster
      metadata:
        name: "${CLUSTER_NAME}"
    - kind: Machine
      metadata:
        name: "${CLUSTER_NAME}-${MACHINE}"
"#,
        );
        let names = TemplateProcessor::for_template(&t).unwrap().all_param_names().unwrap();
        assert_eq!(names, vec!["CLUSTER_NAME", "MACHINE"]);
    }

    #[test]
    fn test_render_templates_preserves_order_and_applies_opts() {
        let t = template(
            r#"
metadata:
  name: cluster-template
spec:
  renderType: templating
  resourcetemplates:
    - kind: Cluster
      metadata:
        name: "{{ .params.CLUSTER_NAME }}"
    - kind: ConfigMap
      metadata:
        name: "{{ .params.CLUSTER_NAME }}-config"
        namespace: kube-system
"#,
        );
        let mut vars = HashMap::new();
        vars.insert("CLUSTER_NAME".to_string(), "testing".to_string());
        let ns = in_namespace("default");
        let out = TemplateProcessor::for_template(&t)
            .unwrap()
            .render_templates(&vars, &[&ns])
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(
            String::from_utf8(out[0].clone()).unwrap(),
            "kind: Cluster\nmetadata:\n  name: testing\n  namespace: default\n"
        );
        assert_eq!(
            String::from_utf8(out[1].clone()).unwrap(),
            "kind: ConfigMap\nmetadata:\n  name: testing-config\n  namespace: kube-system\n"
        );
    }

    #[test]
    fn test_render_templates_wraps_failures_with_resource() {
        let t = template(
            r#"
metadata:
  name: cluster-template
spec:
  resourcetemplates:
    - kind: Cluster
      metadata:
        name: ok
    - kind: Cluster
      metadata:
        name: "${CLUSTER_NAME}"
"#,
        );
        let err = TemplateProcessor::for_template(&t)
            .unwrap()
            .render_templates(&HashMap::new(), &[])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "processing resource template 1 of \"cluster-template\": missing required parameter: CLUSTER_NAME"
        );
        assert_eq!(err.missing_variable(), Some("CLUSTER_NAME"));
    }

    #[test]
    fn test_render_templates_decode_failure() {
        let t = template(
            r#"
metadata:
  name: cluster-template
spec:
  resourcetemplates:
    - metadata:
        name: no-kind
"#,
        );
        let err = TemplateProcessor::for_template(&t)
            .unwrap()
            .render_templates(&HashMap::new(), &[])
            .unwrap_err();
        assert!(err.to_string().starts_with("modifying resource template 0"));
        assert!(err.to_string().contains("Object 'Kind' is missing"));
    }
}
