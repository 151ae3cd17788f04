//! Tree-walking executor.
//!
//! Data is a [`serde_json::Value`]. Field lookups on maps are strict: a key
//! that is not present fails the execution instead of printing a zero value.

use serde_json::Value;

use super::funcs;
use super::node::{Arg, Branch, Command, Node, Number, Pipe};
use crate::document::type_name;
use crate::error::{TemplateError, TemplateResult};

struct State<'a> {
    name: &'a str,
    out: String,
    /// Variable stack, innermost last.
    vars: Vec<(String, Value)>,
}

pub(crate) fn execute(name: &str, nodes: &[Node], data: &Value) -> TemplateResult<String> {
    let mut state = State {
        name,
        out: String::new(),
        vars: vec![("$".to_string(), data.clone())],
    };
    state.walk(data, nodes)?;
    Ok(state.out)
}

impl<'a> State<'a> {
    fn error(&self, line: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::Exec {
            template: self.name.to_string(),
            line,
            message: message.into(),
        }
    }

    fn walk(&mut self, dot: &Value, nodes: &[Node]) -> TemplateResult<()> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Action(pipe) => {
                    let value = self.pipeline(dot, pipe)?;
                    if pipe.decl.is_empty() {
                        self.out.push_str(&funcs::print_value(&value));
                    }
                }
                Node::If(branch) => self.if_or_with(dot, branch, false)?,
                Node::With(branch) => self.if_or_with(dot, branch, true)?,
                Node::Range(branch) => self.range(dot, branch)?,
            }
        }
        Ok(())
    }

    fn if_or_with(&mut self, dot: &Value, branch: &Branch, rebind: bool) -> TemplateResult<()> {
        let mark = self.vars.len();
        let value = self.pipeline(dot, &branch.pipe)?;
        if funcs::truth(&value) {
            let inner = if rebind { &value } else { dot };
            self.walk(inner, &branch.list)?;
        } else if let Some(else_list) = &branch.else_list {
            self.walk(dot, else_list)?;
        }
        self.vars.truncate(mark);
        Ok(())
    }

    fn range(&mut self, dot: &Value, branch: &Branch) -> TemplateResult<()> {
        let value = self.eval_pipeline(dot, &branch.pipe)?;
        let items: Vec<(Value, Value)> = match &value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v.clone()))
                .collect(),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            Value::Number(n) if n.is_i64() => (0..n.as_i64().unwrap_or(0))
                .map(|i| (Value::from(i), Value::from(i)))
                .collect(),
            Value::Null => Vec::new(),
            other => {
                return Err(self.error(
                    branch.line,
                    format!("range can't iterate over {}", funcs::format_value(other)),
                ))
            }
        };

        if items.is_empty() {
            if let Some(else_list) = &branch.else_list {
                self.walk(dot, else_list)?;
            }
            return Ok(());
        }

        let mark = self.vars.len();
        for (key, elem) in items {
            let bindings: Vec<Value> = match branch.pipe.decl.len() {
                1 => vec![elem.clone()],
                2 => vec![key, elem.clone()],
                _ => Vec::new(),
            };
            for (name, bound) in branch.pipe.decl.iter().zip(bindings) {
                self.bind(name, bound, branch.pipe.is_assign, branch.line)?;
            }
            self.walk(&elem, &branch.list)?;
            self.vars.truncate(mark);
        }
        Ok(())
    }

    fn bind(&mut self, name: &str, value: Value, assign: bool, line: usize) -> TemplateResult<()> {
        if !assign {
            self.vars.push((name.to_string(), value));
            return Ok(());
        }
        match self.vars.iter_mut().rev().find(|(n, _)| n == name) {
            Some((_, slot)) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.error(line, format!("undefined variable: {}", name))),
        }
    }

    fn pipeline(&mut self, dot: &Value, pipe: &Pipe) -> TemplateResult<Value> {
        let value = self.eval_pipeline(dot, pipe)?;
        for name in &pipe.decl {
            self.bind(name, value.clone(), pipe.is_assign, pipe.line)?;
        }
        Ok(value)
    }

    fn eval_pipeline(&mut self, dot: &Value, pipe: &Pipe) -> TemplateResult<Value> {
        let mut value = None;
        for cmd in &pipe.cmds {
            value = Some(self.command(dot, cmd, value)?);
        }
        Ok(value.unwrap_or(Value::Null))
    }

    /// Evaluate one command. `piped` is the previous stage's result, passed
    /// as the final argument of a function call.
    fn command(&mut self, dot: &Value, cmd: &Command, piped: Option<Value>) -> TemplateResult<Value> {
        let Some((first, rest)) = cmd.args.split_first() else {
            return Err(self.error(cmd.line, "empty command"));
        };
        match first {
            Arg::Identifier(name) => {
                let mut args = rest
                    .iter()
                    .map(|a| self.arg(dot, a, cmd.line))
                    .collect::<TemplateResult<Vec<_>>>()?;
                args.extend(piped);
                self.call(name, &args, cmd.line)
            }
            Arg::Nil => Err(self.error(cmd.line, "nil is not a command")),
            _ if !rest.is_empty() || piped.is_some() => Err(self.error(
                cmd.line,
                format!("can't give argument to non-function {}", first),
            )),
            _ => self.arg(dot, first, cmd.line),
        }
    }

    fn arg(&mut self, dot: &Value, arg: &Arg, line: usize) -> TemplateResult<Value> {
        match arg {
            Arg::Field(chain) => self.field_chain(dot, chain, arg, line),
            Arg::Dot => Ok(dot.clone()),
            Arg::Variable(chain) => {
                let value = self.variable(&chain[0], line)?;
                self.field_chain(&value, &chain[1..], arg, line)
            }
            Arg::Identifier(name) => self.call(name, &[], line),
            Arg::String(s) => Ok(Value::String(s.clone())),
            Arg::Number(Number::Int(n)) => Ok(Value::from(*n)),
            Arg::Number(Number::Float(f)) => Ok(serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            Arg::Bool(b) => Ok(Value::Bool(*b)),
            Arg::Nil => Ok(Value::Null),
            Arg::Pipe(pipe) => self.pipeline(dot, pipe),
            Arg::Chain(pipe, chain) => {
                let value = self.pipeline(dot, pipe)?;
                self.field_chain(&value, chain, arg, line)
            }
        }
    }

    fn variable(&self, name: &str, line: usize) -> TemplateResult<Value> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| self.error(line, format!("undefined variable: {}", name)))
    }

    fn field_chain(&self, receiver: &Value, chain: &[String], node: &Arg, line: usize) -> TemplateResult<Value> {
        let mut current = receiver;
        for key in chain {
            current = match current {
                Value::Object(map) => match map.get(key) {
                    Some(v) => v,
                    None => {
                        return Err(TemplateError::MissingKey {
                            template: self.name.to_string(),
                            line,
                            node: node.to_string(),
                            key: key.clone(),
                        })
                    }
                },
                Value::Null => {
                    return Err(self.error(line, format!("nil pointer evaluating interface {{}}.{}", key)))
                }
                other => {
                    return Err(self.error(
                        line,
                        format!("can't evaluate field {} in type {}", key, type_name(other)),
                    ))
                }
            };
        }
        Ok(current.clone())
    }

    fn call(&self, name: &str, args: &[Value], line: usize) -> TemplateResult<Value> {
        funcs::call(name, args).map_err(|e| self.error(line, format!("error calling {}: {}", name, e)))
    }
}
