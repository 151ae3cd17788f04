//! A text/template compatible engine for `{{ .params.NAME }}` style bodies.
//!
//! Supports text, actions, comments, trim markers, pipelines, variables,
//! field chains on parenthesized pipelines (`(.params).A`) and
//! `if`/`with`/`range` with `else` chains. Named templates (`define`,
//! `template`, `block`) are not supported.

mod exec;
mod funcs;
mod lex;
pub mod node;
mod parse;

use serde_json::Value;

use crate::error::{TemplateError, TemplateResult};
use node::Node;

/// Lexing failure, turned into [`TemplateError::Parse`] once the template
/// name is known.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    fn into_error(self, template: &str) -> TemplateError {
        TemplateError::Parse {
            template: template.to_string(),
            line: self.line,
            message: self.message,
        }
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTemplate {
    name: String,
    root: Vec<Node>,
}

impl TextTemplate {
    /// Parse `text`. `name` is used in error messages.
    pub fn parse(name: &str, text: &str) -> TemplateResult<Self> {
        Ok(Self {
            name: name.to_string(),
            root: parse::parse(name, text)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The top-level node list.
    pub fn root(&self) -> &[Node] {
        &self.root
    }

    /// Execute against `data`, which is bound to both `.` and `$`.
    pub fn execute(&self, data: &Value) -> TemplateResult<String> {
        exec::execute(&self.name, &self.root, data)
    }
}
