//! Parse tree for the templating language.

use std::fmt;

/// A node in a template body.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    /// `{{ pipeline }}`
    Action(Pipe),
    If(Branch),
    With(Branch),
    Range(Branch),
}

/// The shared shape of `if`, `with` and `range`.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub line: usize,
    pub pipe: Pipe,
    pub list: Vec<Node>,
    pub else_list: Option<Vec<Node>>,
}

/// A pipeline, optionally declaring or assigning variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    pub line: usize,
    pub is_assign: bool,
    pub decl: Vec<String>,
    pub cmds: Vec<Command>,
}

/// One `|` separated stage of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub line: usize,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// `.a.b`, stored as `["a", "b"]`.
    Field(Vec<String>),
    Dot,
    /// `$x.a`, stored as `["$x", "a"]`.
    Variable(Vec<String>),
    /// A function name.
    Identifier(String),
    String(String),
    Number(Number),
    Bool(bool),
    Nil,
    Pipe(Box<Pipe>),
    /// `(pipe).a.b`
    Chain(Box<Pipe>, Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Field(chain) => write!(f, ".{}", chain.join(".")),
            Arg::Dot => write!(f, "."),
            Arg::Variable(chain) => write!(f, "{}", chain.join(".")),
            Arg::Identifier(name) => write!(f, "{}", name),
            Arg::String(s) => write!(f, "{:?}", s),
            Arg::Number(Number::Int(n)) => write!(f, "{}", n),
            Arg::Number(Number::Float(n)) => write!(f, "{}", n),
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Nil => write!(f, "nil"),
            Arg::Pipe(pipe) => write!(f, "({})", pipe),
            Arg::Chain(pipe, chain) => write!(f, "({}).{}", pipe, chain.join(".")),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
        write!(f, "{}", args.join(" "))
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.decl.is_empty() {
            let op = if self.is_assign { "=" } else { ":=" };
            write!(f, "{} {} ", self.decl.join(", "), op)?;
        }
        let cmds: Vec<String> = self.cmds.iter().map(ToString::to_string).collect();
        write!(f, "{}", cmds.join(" | "))
    }
}
