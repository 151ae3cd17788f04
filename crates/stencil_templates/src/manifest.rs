//! Template manifest definitions.
//!
//! A template is a Kubernetes-style object whose spec carries the declared
//! parameters, the resource bodies to render and optional profile (chart)
//! declarations. Templates are produced by an external loader; the types here
//! are read-only input to the rest of the crate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TemplateResult;

/// The substitution language a template is written in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RenderType {
    /// `${VAR}` style substitution.
    #[default]
    Envsubst,
    /// Go text/template style `{{ .params.VAR }}` substitution.
    Templating,
    /// Any unrecognised value, kept so that processor selection can report it.
    Unknown(String),
}

impl RenderType {
    pub const ENVSUBST: &'static str = "envsubst";
    pub const TEMPLATING: &'static str = "templating";

    pub fn as_str(&self) -> &str {
        match self {
            RenderType::Envsubst => Self::ENVSUBST,
            RenderType::Templating => Self::TEMPLATING,
            RenderType::Unknown(s) => s,
        }
    }
}

impl From<String> for RenderType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" | RenderType::ENVSUBST => RenderType::Envsubst,
            RenderType::TEMPLATING => RenderType::Templating,
            _ => RenderType::Unknown(s),
        }
    }
}

impl From<&str> for RenderType {
    fn from(s: &str) -> Self {
        RenderType::from(s.to_string())
    }
}

impl From<RenderType> for String {
    fn from(r: RenderType) -> Self {
        r.as_str().to_string()
    }
}

impl fmt::Display for RenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Object metadata of a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A declared template parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Informational only, never substituted implicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Reference to the source of a chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// Override for the release object generated for a chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelmReleaseTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

/// A structured profile declaration in the template spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub chart: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub layer: String,
    #[serde(default)]
    pub target_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,
    #[serde(default)]
    pub template: HelmReleaseTemplateSpec,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub source_ref: SourceRef,
}

/// Chart list wrapper matching the manifest layout (`spec.charts.items`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartsSpec {
    #[serde(default)]
    pub items: Vec<Chart>,
}

/// Template specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub render_type: RenderType,
    #[serde(default)]
    pub params: Vec<TemplateParam>,
    /// Opaque resource bodies, rendered in order.
    #[serde(default, rename = "resourcetemplates")]
    pub resource_templates: Vec<serde_json::Value>,
    #[serde(default)]
    pub charts: ChartsSpec,
}

impl TemplateSpec {
    /// Look up a declared parameter by name.
    pub fn param(&self, name: &str) -> Option<&TemplateParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// A parameterized bundle of resource bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TemplateSpec,
}

impl Template {
    /// Parse a template manifest from YAML (or JSON) text.
    pub fn from_yaml(content: &str) -> TemplateResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_type_parsing() {
        assert_eq!(RenderType::from(""), RenderType::Envsubst);
        assert_eq!(RenderType::from("envsubst"), RenderType::Envsubst);
        assert_eq!(RenderType::from("templating"), RenderType::Templating);
        assert_eq!(
            RenderType::from("jinja"),
            RenderType::Unknown("jinja".to_string())
        );
        assert_eq!(RenderType::default(), RenderType::Envsubst);
    }

    #[test]
    fn test_template_from_yaml() {
        let template = Template::from_yaml(
            r#"
apiVersion: capi.weave.works/v1alpha2
kind: CAPITemplate
metadata:
  name: cluster-template
  annotations:
    capi.weave.works/profile-0: '{"name": "cert-manager"}'
spec:
  description: this is test template 1
  renderType: templating
  params:
    - name: CLUSTER_NAME
      description: This is used for the cluster naming.
      required: true
    - name: SIZE
      options: [big, small]
  resourcetemplates:
    - apiVersion: cluster.x-k8s.io/v1alpha3
      kind: Cluster
      metadata:
        name: "{{ .params.CLUSTER_NAME }}"
  charts:
    items:
      - chart: podinfo
        version: 6.0.0
        targetNamespace: apps
        sourceRef:
          name: charts
          namespace: default
"#,
        )
        .unwrap();

        assert_eq!(template.name(), "cluster-template");
        assert_eq!(template.kind, "CAPITemplate");
        assert_eq!(template.spec.render_type, RenderType::Templating);
        assert_eq!(template.spec.params.len(), 2);
        assert!(template.spec.param("CLUSTER_NAME").unwrap().required);
        assert_eq!(template.spec.param("SIZE").unwrap().options, vec!["big", "small"]);
        assert_eq!(template.spec.resource_templates.len(), 1);
        assert_eq!(template.spec.charts.items[0].target_namespace, "apps");
        assert_eq!(template.spec.charts.items[0].source_ref.name, "charts");
    }

    #[test]
    fn test_unknown_render_type_is_preserved() {
        let template = Template::from_yaml(
            r#"
metadata:
  name: t
spec:
  renderType: mustache
"#,
        )
        .unwrap();
        assert_eq!(template.spec.render_type.as_str(), "mustache");
    }
}
