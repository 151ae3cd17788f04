//! Parameter metadata merging and template summaries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::Document;
use crate::error::TemplateResult;
use crate::manifest::{Template, TemplateParam, TemplateSpec};
use crate::processor::TemplateProcessor;

/// Display-name annotation read from CAPI template objects.
pub const CAPI_DISPLAY_NAME_ANNOTATION: &str = "capi.weave.works/display-name";

/// Display-name annotation read from GitOps template objects.
pub const GITOPS_DISPLAY_NAME_ANNOTATION: &str = "templates.weave.works/display-name";

/// A discovered parameter with its declared metadata, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Summary of one resource body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    pub kind: String,
    pub api_version: String,
    pub name: String,
    pub params: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
}

/// Everything a caller needs to describe a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMeta {
    pub name: String,
    pub description: String,
    pub params: Vec<Param>,
    pub objects: Vec<Object>,
}

/// Enrich sorted discovered `names` with the matching declarations.
/// Declarations for names no body references are dropped.
pub fn merge_params(names: Vec<String>, declared: &[TemplateParam]) -> Vec<Param> {
    let declared: HashMap<&str, &TemplateParam> =
        declared.iter().map(|p| (p.name.as_str(), p)).collect();
    let mut params: Vec<Param> = names
        .into_iter()
        .map(|name| match declared.get(name.as_str()) {
            Some(d) => Param {
                description: d.description.clone(),
                required: d.required,
                options: d.options.clone(),
                default: d.default.clone(),
                name,
            },
            None => Param::new(name),
        })
        .collect();
    params.sort_by(|a, b| a.name.cmp(&b.name));
    params
}

/// Enriched parameters of a template spec.
pub fn params(spec: &TemplateSpec) -> TemplateResult<Vec<Param>> {
    TemplateProcessor::for_spec("", spec)?.params()
}

/// Enriched parameters of a full template.
pub fn params_from_template(template: &Template) -> TemplateResult<Vec<Param>> {
    TemplateProcessor::for_template(template)?.params()
}

/// Summarize a template: its parameters plus one [`Object`] per resource
/// body, with the display name read from `display_name_annotation`.
pub fn parse_template_meta(template: &Template, display_name_annotation: &str) -> TemplateResult<TemplateMeta> {
    let processor = TemplateProcessor::for_template(template)?;
    let name = template.name();

    let mut objects = Vec::with_capacity(template.spec.resource_templates.len());
    for (index, body) in template.spec.resource_templates.iter().enumerate() {
        let params = processor
            .param_names(body)
            .map_err(|e| e.in_resource("getting params from", name, index))?;
        let doc = Document::from_value(body.clone())
            .map_err(|e| e.in_resource("decoding", name, index))?;
        let display_name = doc
            .annotations()
            .map_err(|e| e.in_resource("decoding", name, index))?
            .remove(display_name_annotation)
            .unwrap_or_default();
        objects.push(Object {
            kind: doc.kind().to_string(),
            api_version: doc.api_version().to_string(),
            name: doc.name().to_string(),
            params,
            display_name,
        });
    }
    debug!(template = name, objects = objects.len(), "Parsed template metadata");

    Ok(TemplateMeta {
        name: name.to_string(),
        description: template.spec.description.clone(),
        params: processor.params()?,
        objects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(yaml: &str) -> Template {
        Template::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_merge_params() {
        let declared = vec![
            TemplateParam {
                name: "B".into(),
                description: "bee".into(),
                required: true,
                options: vec!["x".into(), "y".into()],
                default: Some("x".into()),
            },
            TemplateParam {
                name: "UNUSED".into(),
                ..Default::default()
            },
        ];
        let got = merge_params(vec!["A".into(), "B".into()], &declared);
        assert_eq!(
            got,
            vec![
                Param::new("A"),
                Param {
                    name: "B".into(),
                    description: "bee".into(),
                    required: true,
                    options: vec!["x".into(), "y".into()],
                    default: Some("x".into()),
                },
            ]
        );
    }

    #[test]
    fn test_params_without_declarations() {
        let t = template(
            r#"
metadata:
  name: t
spec:
  resourcetemplates:
    - kind: Cluster
      metadata:
        name: "${B}"
    - kind: Machine
      metadata:
        name: "${A}"
"#,
        );
        assert_eq!(params_from_template(&t).unwrap(), vec![Param::new("A"), Param::new("B")]);
        assert_eq!(params(&t.spec).unwrap(), vec![Param::new("A"), Param::new("B")]);
    }

    #[test]
    fn test_params_unknown_render_type() {
        let t = template("metadata:\n  name: t\nspec:\n  renderType: nope\n");
        assert!(params_from_template(&t).is_err());
    }

    #[test]
    fn test_parse_template_meta() {
        let t = template(
            r#"
metadata:
  name: cluster-template
spec:
  description: a cluster
  renderType: templating
  params:
    - name: CLUSTER_NAME
      description: the name
      required: true
  resourcetemplates:
    - apiVersion: cluster.x-k8s.io/v1alpha3
      kind: Cluster
      metadata:
        name: "{{ .params.CLUSTER_NAME }}"
        annotations:
          templates.weave.works/display-name: ClusterName
    - apiVersion: v1
      kind: ConfigMap
      metadata:
        name: "{{ .params.CLUSTER_NAME }}-{{ .params.SUFFIX }}"
"#,
        );
        let meta = parse_template_meta(&t, GITOPS_DISPLAY_NAME_ANNOTATION).unwrap();
        assert_eq!(meta.name, "cluster-template");
        assert_eq!(meta.description, "a cluster");
        assert_eq!(meta.params.len(), 2);
        assert!(meta.params[0].required);
        assert_eq!(meta.params[1], Param::new("SUFFIX"));
        assert_eq!(
            meta.objects,
            vec![
                Object {
                    kind: "Cluster".into(),
                    api_version: "cluster.x-k8s.io/v1alpha3".into(),
                    name: "{{ .params.CLUSTER_NAME }}".into(),
                    params: vec!["CLUSTER_NAME".into()],
                    display_name: "ClusterName".into(),
                },
                Object {
                    kind: "ConfigMap".into(),
                    api_version: "v1".into(),
                    name: "{{ .params.CLUSTER_NAME }}-{{ .params.SUFFIX }}".into(),
                    params: vec!["CLUSTER_NAME".into(), "SUFFIX".into()],
                    display_name: String::new(),
                },
            ]
        );

        let capi = parse_template_meta(&t, CAPI_DISPLAY_NAME_ANNOTATION).unwrap();
        assert_eq!(capi.objects[0].display_name, "");
    }

    #[test]
    fn test_parse_template_meta_bad_body() {
        let t = template(
            r#"
metadata:
  name: t
spec:
  resourcetemplates:
    - kind: Cluster
    - metadata:
        name: no-kind
"#,
        );
        let err = parse_template_meta(&t, CAPI_DISPLAY_NAME_ANNOTATION).unwrap_err();
        assert!(err.to_string().starts_with("decoding resource template 1 of \"t\""));
    }
}
