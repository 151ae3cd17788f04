//! `{{ .params.NAME }}` style substitution.

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};

use crate::error::TemplateResult;
use crate::gotmpl::node::{Arg, Node, Pipe};
use crate::gotmpl::TextTemplate;

/// Root key of the render context holding the parameter values.
pub const PARAMS_KEY: &str = "params";

/// The variable bound to the render context for the whole execution.
const ROOT_VARIABLE: &str = "$";

/// Processor for templates written in the templating language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextTemplateProcessor;

impl TextTemplateProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the sorted, de-duplicated parameter names referenced in `body`.
    ///
    /// Every field chain contributes a name. Chains rooted at `.params`
    /// contribute the remainder (`.params.A.b` gives `A.b`); any other chain
    /// contributes itself, so fields read from a rebound dot inside `range`
    /// or `with` are reported too. `$.params.A` names `A` as well; other
    /// variables contribute nothing.
    pub fn param_names(&self, body: &str) -> TemplateResult<Vec<String>> {
        let template = TextTemplate::parse("", body)?;
        let mut names = BTreeSet::new();
        visit_nodes(template.root(), &mut names);
        Ok(names.into_iter().collect())
    }

    /// Execute `body` with `{"params": values}` as its data. `name` is the
    /// template name used in error messages.
    pub fn render(&self, name: &str, body: &str, values: &HashMap<String, String>) -> TemplateResult<String> {
        let template = TextTemplate::parse(name, body)?;
        template.execute(&render_context(values))
    }
}

fn render_context(values: &HashMap<String, String>) -> Value {
    let params: Map<String, Value> = values
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let mut context = Map::new();
    context.insert(PARAMS_KEY.to_string(), Value::Object(params));
    Value::Object(context)
}

/// Returns the parameter a field chain names when it is rooted at `.params`.
fn params_reference(chain: &[String]) -> Option<String> {
    match chain.split_first() {
        Some((root, rest)) if root == PARAMS_KEY && !rest.is_empty() => Some(rest.join(".")),
        _ => None,
    }
}

fn record_field(chain: &[String], names: &mut BTreeSet<String>) {
    if let Some(name) = params_reference(chain) {
        names.insert(name);
    } else if chain.first().is_some_and(|root| root != PARAMS_KEY) {
        names.insert(chain.join("."));
    }
}

/// True for a parenthesized `.params` or `$.params`.
fn is_params_map(pipe: &Pipe) -> bool {
    let [cmd] = pipe.cmds.as_slice() else {
        return false;
    };
    match cmd.args.as_slice() {
        [Arg::Field(chain)] => chain.len() == 1 && chain[0] == PARAMS_KEY,
        [Arg::Variable(chain)] => chain.len() == 2 && chain[0] == ROOT_VARIABLE && chain[1] == PARAMS_KEY,
        _ => false,
    }
}

fn visit_nodes(nodes: &[Node], names: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Action(pipe) => visit_pipe(pipe, names),
            Node::If(branch) | Node::With(branch) | Node::Range(branch) => {
                visit_pipe(&branch.pipe, names);
                visit_nodes(&branch.list, names);
                if let Some(else_list) = &branch.else_list {
                    visit_nodes(else_list, names);
                }
            }
        }
    }
}

fn visit_pipe(pipe: &Pipe, names: &mut BTreeSet<String>) {
    for arg in pipe.cmds.iter().flat_map(|cmd| &cmd.args) {
        match arg {
            Arg::Field(chain) => record_field(chain, names),
            Arg::Variable(chain) if chain.first().is_some_and(|v| v == ROOT_VARIABLE) => {
                if let Some(name) = params_reference(&chain[1..]) {
                    names.insert(name);
                }
            }
            Arg::Pipe(inner) => visit_pipe(inner, names),
            Arg::Chain(inner, chain) => {
                visit_pipe(inner, names);
                if is_params_map(inner) && !chain.is_empty() {
                    names.insert(chain.join("."));
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_names() {
        let tests: Vec<(&str, Vec<&str>)> = vec![
            ("foo: bar", vec![]),
            ("name: {{ .params.CLUSTER_NAME }}", vec!["CLUSTER_NAME"]),
            (
                "name: {{ .params.B }}-{{ .params.A }}-{{ .params.B }}",
                vec!["A", "B"],
            ),
            (
                r#"name: {{ .params.CLUSTER_NAME | replace "." "-" }}"#,
                vec!["CLUSTER_NAME"],
            ),
            ("{{ if .params.ENABLED }}{{ .params.VALUE }}{{ end }}", vec!["ENABLED", "VALUE"]),
            (
                "{{ with .params.A }}{{ else }}{{ .params.B }}{{ end }}",
                vec!["A", "B"],
            ),
            (r#"{{ printf "%s" (lower .params.INNER) }}"#, vec!["INNER"]),
            ("{{ .params.NESTED.key }}", vec!["NESTED.key"]),
            ("{{ range $k, $v := .params }}{{ $v }}{{ end }}", vec![]),
            ("{{ $x := 1 }}{{ $x }}{{ . }}", vec![]),
            ("{{ range .params.L }}{{ $.params.X }}{{ end }}", vec!["L", "X"]),
            ("name: {{ $.params.CLUSTER_NAME }}", vec!["CLUSTER_NAME"]),
            ("{{ $.params }}{{ $.other }}", vec![]),
            ("{{ (.params).A }}{{ ($.params).B.c }}", vec!["A", "B.c"]),
        ];

        for (input, want) in tests {
            let got = TextTemplateProcessor.param_names(input).unwrap();
            assert_eq!(got, want, "input: {}", input);
        }
    }

    #[test]
    fn test_param_names_reports_fields_of_rebound_dot() {
        let got = TextTemplateProcessor
            .param_names("{{ range .params.LIST }}{{ .name }}{{ end }}")
            .unwrap();
        assert_eq!(got, vec!["LIST", "name"]);
    }

    #[test]
    fn test_param_names_parse_error() {
        assert!(TextTemplateProcessor.param_names("{{ .params.A ").is_err());
        let err = TextTemplateProcessor
            .param_names("{{ env \"HOME\" }}")
            .unwrap_err();
        assert!(err.to_string().contains("function \"env\" not defined"));
    }

    #[test]
    fn test_render() {
        let mut values = HashMap::new();
        values.insert("CLUSTER_NAME".to_string(), "testing".to_string());
        let got = TextTemplateProcessor
            .render("cluster-template", "name: {{ .params.CLUSTER_NAME }}", &values)
            .unwrap();
        assert_eq!(got, "name: testing");
    }

    #[test]
    fn test_render_missing_key() {
        let err = TextTemplateProcessor
            .render("cluster-template", "name: {{ .params.bar }}", &HashMap::new())
            .unwrap_err();
        assert_eq!(err.missing_variable(), Some("bar"));
        assert!(err.to_string().starts_with("template: cluster-template:1:"));
    }
}
