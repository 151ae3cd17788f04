//! Profile declarations attached to templates.
//!
//! Profiles come from two places: JSON-encoded annotations with the
//! [`PROFILE_ANNOTATION_PREFIX`] and the structured `spec.charts.items`
//! list. A chart entry replaces an annotation entry with the same name.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::manifest::{Chart, SourceRef, Template};

/// Prefix of annotations holding JSON profile declarations.
pub const PROFILE_ANNOTATION_PREFIX: &str = "capi.weave.works/profile-";

/// The JSON shape of a profile annotation value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileAnnotation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub values: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub layer: String,
    /// `None` when the annotation does not mention it.
    #[serde(default)]
    pub required: Option<bool>,
}

/// A resolved profile declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateProfile {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub required: bool,
    /// Values as YAML text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub values: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub layer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<SourceRef>,
    /// Release template override as YAML text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile_template: String,
}

impl From<ProfileAnnotation> for TemplateProfile {
    fn from(a: ProfileAnnotation) -> Self {
        Self {
            name: a.name,
            version: a.version,
            editable: a.editable,
            required: a.required.unwrap_or(true),
            values: a.values,
            namespace: a.namespace,
            layer: a.layer,
            source_ref: None,
            profile_template: String::new(),
        }
    }
}

impl TryFrom<&Chart> for TemplateProfile {
    type Error = TemplateError;

    fn try_from(chart: &Chart) -> TemplateResult<Self> {
        Ok(Self {
            name: chart.chart.clone(),
            version: chart.version.clone(),
            editable: chart.editable,
            required: chart.required,
            values: optional_yaml(chart.values.as_ref())?,
            namespace: chart.target_namespace.clone(),
            layer: chart.layer.clone(),
            source_ref: Some(chart.source_ref.clone()),
            profile_template: optional_yaml(chart.template.content.as_ref())?,
        })
    }
}

fn optional_yaml(value: Option<&serde_json::Value>) -> TemplateResult<String> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(v) => Ok(serde_yaml::to_string(v)?),
    }
}

/// The template annotations that declare profiles.
pub fn profile_annotations(template: &Template) -> BTreeMap<String, String> {
    template
        .metadata
        .annotations
        .iter()
        .filter(|(k, _)| k.starts_with(PROFILE_ANNOTATION_PREFIX))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// All profiles declared by a template, sorted by name.
pub fn get_profiles_from_template(template: &Template) -> TemplateResult<Vec<TemplateProfile>> {
    let mut profiles: HashMap<String, TemplateProfile> = HashMap::new();

    for value in profile_annotations(template).values() {
        let annotation: ProfileAnnotation =
            serde_json::from_str(value).map_err(TemplateError::ProfileJson)?;
        if annotation.name.is_empty() {
            return Err(TemplateError::ProfileNameRequired);
        }
        profiles.insert(annotation.name.clone(), annotation.into());
    }

    for chart in &template.spec.charts.items {
        let profile = TemplateProfile::try_from(chart)?;
        profiles.insert(profile.name.clone(), profile);
    }

    let mut profiles: Vec<TemplateProfile> = profiles.into_values().collect();
    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(template = template.name(), count = profiles.len(), "Resolved template profiles");
    Ok(profiles)
}

/// Whether any profile of the template must be installed.
pub fn template_has_required_profiles(template: &Template) -> TemplateResult<bool> {
    Ok(get_profiles_from_template(template)?
        .iter()
        .any(|p| p.required))
}
