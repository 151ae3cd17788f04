//! Error types for templates.

use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while extracting parameters from, rendering or
/// validating templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("unknown template renderType: {0}")]
    UnknownRenderType(String),

    /// An envsubst variable was referenced but not supplied.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// A templating lookup hit a key that is not in the map.
    #[error("template: {template}:{line}: executing \"{template}\" at <{node}>: map has no entry for key \"{key}\"")]
    MissingKey {
        template: String,
        line: usize,
        node: String,
        key: String,
    },

    #[error("template: {template}:{line}: {message}")]
    Parse {
        template: String,
        line: usize,
        message: String,
    },

    #[error("template: {template}:{line}: function \"{function}\" not defined")]
    UndefinedFunction {
        template: String,
        line: usize,
        function: String,
    },

    #[error("template: {template}:{line}: executing \"{template}\": {message}")]
    Exec {
        template: String,
        line: usize,
        message: String,
    },

    #[error("{0}")]
    Envsubst(String),

    #[error("{path}: {message}")]
    Document { path: String, message: String },

    #[error("invalid value for metadata.name: {name:?}, {}", .violations.join(","))]
    InvalidName {
        name: String,
        violations: Vec<String>,
    },

    #[error("profile name is required")]
    ProfileNameRequired,

    #[error("failed to unmarshal profiles: {0}")]
    ProfileJson(#[source] serde_json::Error),

    /// Wraps a failure with the template, operation and resource body it
    /// happened in.
    #[error("{operation} resource template {index} of {template:?}: {source}")]
    Resource {
        operation: &'static str,
        template: String,
        index: usize,
        #[source]
        source: Box<TemplateError>,
    },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<TemplateError>,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TemplateError {
    /// Wrap this error with the resource body it was produced by.
    pub fn in_resource(self, operation: &'static str, template: &str, index: usize) -> Self {
        TemplateError::Resource {
            operation,
            template: template.to_string(),
            index,
            source: Box::new(self),
        }
    }

    /// Wrap this error with a free-form description of what was being done.
    pub fn context(self, context: impl Into<String>) -> Self {
        TemplateError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the name of the missing variable if this error, or the error it
    /// wraps, was caused by a referenced-but-unsupplied parameter.
    ///
    /// Both substitution languages report this condition with their own
    /// message format; this accessor lets callers treat them alike.
    pub fn missing_variable(&self) -> Option<&str> {
        match self {
            TemplateError::MissingParameter(name) => Some(name),
            TemplateError::MissingKey { key, .. } => Some(key),
            TemplateError::Resource { source, .. } | TemplateError::Context { source, .. } => {
                source.missing_variable()
            }
            _ => None,
        }
    }

    /// Returns the innermost error, skipping context wrappers.
    pub fn root_cause(&self) -> &TemplateError {
        match self {
            TemplateError::Resource { source, .. } | TemplateError::Context { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    pub(crate) fn document(path: &[&str], message: impl Into<String>) -> Self {
        TemplateError::Document {
            path: format!(".{}", path.join(".")),
            message: message.into(),
        }
    }
}
