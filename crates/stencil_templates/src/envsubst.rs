//! `${VAR}` style substitution.
//!
//! Supported forms:
//!
//! - `${NAME}` and bare `$NAME`
//! - `${NAME:-default}` / `${NAME:=default}`: default when unset or empty
//! - `${NAME-default}` / `${NAME=default}`: default when unset
//! - `$$` for a literal `$`
//!
//! Defaults may themselves reference variables, as in `${A:-${B}}`.
//!
//! Unlike the shell tool, an unset variable without a default is an error
//! rather than an empty string.

use std::collections::{BTreeSet, HashMap};

use crate::error::{TemplateError, TemplateResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Var(Variable<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Variable<'a> {
    name: &'a str,
    default: Option<Fallback<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fallback<'a> {
    value: Vec<Segment<'a>>,
    /// `:-` / `:=` also apply to set-but-empty values.
    when_empty: bool,
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Split `input` into literal text and variable references.
fn scan(input: &str) -> TemplateResult<Vec<Segment<'_>>> {
    let bytes = input.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' || i + 1 >= bytes.len() {
            i += 1;
            continue;
        }

        match bytes[i + 1] {
            b'$' => {
                segments.push(Segment::Text(&input[text_start..i]));
                segments.push(Segment::Text("$"));
                i += 2;
                text_start = i;
            }
            b'{' => {
                let body_start = i + 2;
                let Some(close) = closing_brace(&input[body_start..]) else {
                    return Err(TemplateError::Envsubst("missing closing brace".to_string()));
                };
                let body = &input[body_start..body_start + close];
                segments.push(Segment::Text(&input[text_start..i]));
                segments.push(Segment::Var(parse_braced(body)?));
                i = body_start + close + 1;
                text_start = i;
            }
            c if is_name_start(c) => {
                let name_start = i + 1;
                let mut end = name_start;
                while end < bytes.len() && is_name_char(bytes[end]) {
                    end += 1;
                }
                segments.push(Segment::Text(&input[text_start..i]));
                segments.push(Segment::Var(Variable {
                    name: &input[name_start..end],
                    default: None,
                }));
                i = end;
                text_start = i;
            }
            _ => i += 1,
        }
    }
    segments.push(Segment::Text(&input[text_start..]));
    segments.retain(|s| !matches!(s, Segment::Text("")));
    Ok(segments)
}

/// Offset of the `}` matching an already consumed `{`.
fn closing_brace(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in rest.bytes().enumerate() {
        match c {
            b'{' => depth += 1,
            b'}' if depth == 0 => return Some(i),
            b'}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn parse_braced(body: &str) -> TemplateResult<Variable<'_>> {
    let bad = || TemplateError::Envsubst(format!("bad substitution: ${{{}}}", body));

    let name_len = body.bytes().take_while(|c| is_name_char(*c)).count();
    if name_len == 0 || !is_name_start(body.as_bytes()[0]) {
        return Err(bad());
    }
    let (name, rest) = body.split_at(name_len);

    let default = if rest.is_empty() {
        None
    } else if let Some(value) = rest.strip_prefix(":-").or_else(|| rest.strip_prefix(":=")) {
        Some(Fallback {
            value: scan(value)?,
            when_empty: true,
        })
    } else if let Some(value) = rest.strip_prefix('-').or_else(|| rest.strip_prefix('=')) {
        Some(Fallback {
            value: scan(value)?,
            when_empty: false,
        })
    } else {
        return Err(bad());
    };

    Ok(Variable { name, default })
}

/// Processor for templates written with `${VAR}` placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvsubstProcessor;

impl EnvsubstProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the sorted, de-duplicated variable names referenced in `body`.
    /// Names inside defaults are included.
    pub fn param_names(&self, body: &str) -> TemplateResult<Vec<String>> {
        let mut names = BTreeSet::new();
        collect_names(&scan(body)?, &mut names);
        Ok(names.into_iter().collect())
    }

    /// Substitute `values` into `body`.
    ///
    /// Fails with [`TemplateError::MissingParameter`] on the first variable
    /// that is neither supplied nor has a default.
    pub fn render(&self, body: &str, values: &HashMap<String, String>) -> TemplateResult<String> {
        let mut out = String::with_capacity(body.len());
        render_segments(&scan(body)?, values, &mut out)?;
        Ok(out)
    }
}

fn collect_names(segments: &[Segment<'_>], names: &mut BTreeSet<String>) {
    for segment in segments {
        if let Segment::Var(var) = segment {
            names.insert(var.name.to_string());
            if let Some(default) = &var.default {
                collect_names(&default.value, names);
            }
        }
    }
}

fn render_segments(
    segments: &[Segment<'_>],
    values: &HashMap<String, String>,
    out: &mut String,
) -> TemplateResult<()> {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Var(var) => resolve(var, values, out)?,
        }
    }
    Ok(())
}

/// Defaults are only rendered when used, so a missing variable inside an
/// unused default is not an error.
fn resolve(var: &Variable<'_>, values: &HashMap<String, String>, out: &mut String) -> TemplateResult<()> {
    match (values.get(var.name), &var.default) {
        (Some(v), Some(d)) if v.is_empty() && d.when_empty => render_segments(&d.value, values, out),
        (Some(v), _) => {
            out.push_str(v);
            Ok(())
        }
        (None, Some(d)) => render_segments(&d.value, values, out),
        (None, None) => Err(TemplateError::MissingParameter(var.name.to_string())),
    }
}
