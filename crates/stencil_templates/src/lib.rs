//! # stencil_templates
//!
//! Parameter discovery, rendering and post-processing of resource-manifest
//! templates.
//!
//! A [`Template`] bundles resource bodies with declared parameters. The
//! bodies are written in one of two substitution languages, selected by the
//! template's render type:
//!
//! - `envsubst`: `${NAME}` placeholders
//! - `templating`: text/template style `{{ .params.NAME }}` actions
//!
//! Rendered bodies are decoded, passed through a list of transforms
//! (namespace defaulting, annotation and label injection) and serialized
//! again, in the order the bodies were declared.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use stencil_templates::{
//!     in_namespace, inject_prune_annotation, validate_rendered_templates, Template,
//!     TemplateProcessor,
//! };
//!
//! let template = Template::from_yaml(&std::fs::read_to_string("template.yaml").unwrap()).unwrap();
//! let processor = TemplateProcessor::for_template(&template).unwrap();
//!
//! let mut vars = HashMap::new();
//! vars.insert("CLUSTER_NAME".to_string(), "dev".to_string());
//!
//! let ns = in_namespace("default");
//! let rendered = processor
//!     .render_templates(&vars, &[&ns, &inject_prune_annotation])
//!     .unwrap();
//! validate_rendered_templates(&rendered).unwrap();
//! ```

pub mod document;
pub mod envsubst;
pub mod error;
pub mod gotmpl;
pub mod manifest;
pub mod params;
pub mod processor;
pub mod profiles;
pub mod render;
pub mod templating;
pub mod validator;

pub use document::Document;
pub use envsubst::EnvsubstProcessor;
pub use error::{TemplateError, TemplateResult};
pub use gotmpl::TextTemplate;
pub use manifest::{
    Chart, ChartsSpec, HelmReleaseTemplateSpec, ObjectMeta, RenderType, SourceRef, Template,
    TemplateParam, TemplateSpec,
};
pub use params::{
    merge_params, params, params_from_template, parse_template_meta, Object, Param, TemplateMeta,
    CAPI_DISPLAY_NAME_ANNOTATION, GITOPS_DISPLAY_NAME_ANNOTATION,
};
pub use processor::{Processor, TemplateProcessor};
pub use profiles::{
    get_profiles_from_template, profile_annotations, template_has_required_profiles,
    ProfileAnnotation, TemplateProfile, PROFILE_ANNOTATION_PREFIX,
};
pub use render::{
    in_namespace, inject_json_annotation, inject_labels, inject_prune_annotation, join_documents,
    process_document, stamp_create_request, stamp_created_files, RenderOpt,
    CREATED_FILES_ANNOTATION, CREATE_REQUEST_ANNOTATION, PRUNE_ANNOTATION, PRUNE_ANNOTATION_VALUE,
    PRUNE_EXCLUDED_KINDS,
};
pub use templating::TextTemplateProcessor;
pub use validator::{dns1123_subdomain_violations, validate_rendered_templates};
