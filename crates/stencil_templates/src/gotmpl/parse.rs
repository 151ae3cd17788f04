//! Recursive-descent parser producing a [`Node`] list.

use super::funcs;
use super::lex::{lex, Keyword, Token, TokenKind};
use super::node::{Arg, Branch, Command, Node, Number, Pipe};
use crate::error::{TemplateError, TemplateResult};

/// Where a list of nodes stopped.
enum Stop {
    Eof,
    End(usize),
    Else(usize),
    /// `{{ else if ... }}` / `{{ else with ... }}`
    ElseChain(usize, Keyword),
}

struct Parser<'a> {
    name: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Variables in scope, innermost last. `$` is always defined.
    vars: Vec<String>,
}

/// Parse `input` into a node list. Unknown functions and undeclared
/// variables are rejected here rather than at execution time.
pub(crate) fn parse(name: &str, input: &str) -> TemplateResult<Vec<Node>> {
    let tokens = lex(input).map_err(|e| e.into_error(name))?;
    let mut parser = Parser {
        name,
        tokens,
        pos: 0,
        vars: vec!["$".to_string()],
    };
    let (nodes, stop) = parser.list()?;
    match stop {
        Stop::Eof => Ok(nodes),
        Stop::End(line) => Err(parser.error(line, "unexpected {{end}}")),
        Stop::Else(line) | Stop::ElseChain(line, _) => {
            Err(parser.error(line, "unexpected {{else}}"))
        }
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let cleaned = text.replace('_', "");
    let (negative, digits) = match cleaned.as_bytes().first() {
        Some(b'-') => (true, &cleaned[1..]),
        Some(b'+') => (false, &cleaned[1..]),
        _ => (false, cleaned.as_str()),
    };
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let n = i64::from_str_radix(hex, 16).ok()?;
        return Some(Number::Int(if negative { -n } else { n }));
    }
    if let Ok(n) = cleaned.parse::<i64>() {
        return Some(Number::Int(n));
    }
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite()).map(Number::Float)
}

impl<'a> Parser<'a> {
    fn error(&self, line: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::Parse {
            template: self.name.to_string(),
            line,
            message: message.into(),
        }
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, token: Option<Token>, context: &str) -> TemplateError {
        match token {
            Some(t) => self.error(t.line, format!("unexpected {} in {}", t.kind.describe(), context)),
            None => self.error(self.line(), format!("unexpected EOF in {}", context)),
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> TemplateResult<()> {
        match self.next() {
            Some(t) if t.kind == kind => Ok(()),
            other => Err(self.unexpected(other, context)),
        }
    }

    fn list(&mut self) -> TemplateResult<(Vec<Node>, Stop)> {
        let mut nodes = Vec::new();
        while let Some(token) = self.next() {
            match token.kind {
                TokenKind::Text(text) => nodes.push(Node::Text(text)),
                TokenKind::LeftDelim => {
                    if let Some(stop) = self.action(&mut nodes)? {
                        return Ok((nodes, stop));
                    }
                }
                other => {
                    return Err(self.error(token.line, format!("unexpected {}", other.describe())))
                }
            }
        }
        Ok((nodes, Stop::Eof))
    }

    fn action(&mut self, nodes: &mut Vec<Node>) -> TemplateResult<Option<Stop>> {
        let line = self.line();
        match self.peek_kind(0).cloned() {
            Some(TokenKind::Keyword(Keyword::End)) => {
                self.pos += 1;
                self.expect(TokenKind::RightDelim, "end")?;
                Ok(Some(Stop::End(line)))
            }
            Some(TokenKind::Keyword(Keyword::Else)) => {
                self.pos += 1;
                match self.peek_kind(0).cloned() {
                    Some(TokenKind::Keyword(k @ (Keyword::If | Keyword::With))) => {
                        self.pos += 1;
                        Ok(Some(Stop::ElseChain(line, k)))
                    }
                    _ => {
                        self.expect(TokenKind::RightDelim, "else")?;
                        Ok(Some(Stop::Else(line)))
                    }
                }
            }
            Some(TokenKind::Keyword(k @ (Keyword::If | Keyword::With | Keyword::Range))) => {
                self.pos += 1;
                nodes.push(self.control(k, line)?);
                Ok(None)
            }
            Some(TokenKind::Keyword(k)) => {
                Err(self.error(line, format!("unsupported action {:?}", k.as_str())))
            }
            Some(_) => {
                let pipe = self.pipeline("command", TokenKind::RightDelim, false)?;
                nodes.push(Node::Action(pipe));
                Ok(None)
            }
            None => Err(self.error(line, "unexpected EOF")),
        }
    }

    /// Parse the rest of an `if`, `with` or `range` after its keyword,
    /// through the matching `{{ end }}`.
    fn control(&mut self, kind: Keyword, line: usize) -> TemplateResult<Node> {
        let scope = self.vars.len();
        let context = kind.as_str();
        let pipe = self.pipeline(context, TokenKind::RightDelim, kind == Keyword::Range)?;

        let (list, stop) = self.list()?;
        let else_list = match stop {
            Stop::End(_) => None,
            Stop::Else(_) => match self.list()? {
                (else_list, Stop::End(_)) => Some(else_list),
                (_, Stop::Eof) => return Err(self.error(line, format!("unexpected EOF in {}", context))),
                (_, Stop::Else(l) | Stop::ElseChain(l, _)) => {
                    return Err(self.error(l, format!("expected end; found {{{{else}}}} in {}", context)))
                }
            },
            // The chained control consumes the shared {{ end }}.
            Stop::ElseChain(l, chained) => Some(vec![self.control(chained, l)?]),
            Stop::Eof => return Err(self.error(line, format!("unexpected EOF in {}", context))),
        };
        self.vars.truncate(scope);

        let branch = Branch {
            line,
            pipe,
            list,
            else_list,
        };
        Ok(match kind {
            Keyword::If => Node::If(branch),
            Keyword::With => Node::With(branch),
            _ => Node::Range(branch),
        })
    }

    fn pipeline(&mut self, context: &str, end: TokenKind, multi_decl: bool) -> TemplateResult<Pipe> {
        let line = self.line();
        let mut decl = Vec::new();
        let mut is_assign = false;

        if let Some(TokenKind::Variable(first)) = self.peek_kind(0).cloned() {
            if first.len() == 1 {
                match self.peek_kind(1) {
                    Some(TokenKind::Declare) | Some(TokenKind::Assign) => {
                        is_assign = self.peek_kind(1) == Some(&TokenKind::Assign);
                        decl.push(first[0].clone());
                        self.pos += 2;
                    }
                    Some(TokenKind::Comma) if multi_decl => {
                        self.pos += 2;
                        let second = match self.next() {
                            Some(Token {
                                kind: TokenKind::Variable(v),
                                ..
                            }) if v.len() == 1 => v[0].clone(),
                            other => return Err(self.unexpected(other, context)),
                        };
                        match self.next() {
                            Some(t) if t.kind == TokenKind::Declare => {}
                            Some(t) if t.kind == TokenKind::Assign => is_assign = true,
                            other => return Err(self.unexpected(other, context)),
                        }
                        decl.push(first[0].clone());
                        decl.push(second);
                    }
                    _ => {}
                }
            }
        }
        if is_assign {
            if let Some(undefined) = decl.iter().find(|v| !self.vars.contains(v)) {
                return Err(self.error(line, format!("undefined variable {:?}", undefined)));
            }
        }

        let mut cmds = Vec::new();
        loop {
            cmds.push(self.command(context, &end)?);
            match self.next() {
                Some(t) if t.kind == TokenKind::Pipe => continue,
                Some(t) if t.kind == end => break,
                other => return Err(self.unexpected(other, context)),
            }
        }

        if !is_assign {
            self.vars.extend(decl.iter().cloned());
        }
        Ok(Pipe {
            line,
            is_assign,
            decl,
            cmds,
        })
    }

    fn command(&mut self, context: &str, end: &TokenKind) -> TemplateResult<Command> {
        let line = self.line();
        let mut args = Vec::new();
        loop {
            let Some(token) = self.tokens.get(self.pos).cloned() else {
                return Err(self.unexpected(None, context));
            };
            if token.kind == TokenKind::Pipe || token.kind == *end {
                break;
            }
            self.pos += 1;
            let arg = match token.kind {
                TokenKind::Field(chain) => Arg::Field(chain),
                TokenKind::Dot => Arg::Dot,
                TokenKind::Variable(chain) => {
                    if !self.vars.contains(&chain[0]) {
                        return Err(self.error(token.line, format!("undefined variable {:?}", chain[0])));
                    }
                    Arg::Variable(chain)
                }
                TokenKind::Identifier(name) => {
                    if !funcs::is_defined(&name) {
                        return Err(TemplateError::UndefinedFunction {
                            template: self.name.to_string(),
                            line: token.line,
                            function: name,
                        });
                    }
                    Arg::Identifier(name)
                }
                TokenKind::String(s) => Arg::String(s),
                TokenKind::Number(text) => match parse_number(&text) {
                    Some(n) => Arg::Number(n),
                    None => return Err(self.error(token.line, format!("bad number syntax: {:?}", text))),
                },
                TokenKind::Bool(b) => Arg::Bool(b),
                TokenKind::Nil => Arg::Nil,
                TokenKind::LeftParen => {
                    let pipe = Box::new(self.pipeline("parenthesized pipeline", TokenKind::RightParen, false)?);
                    match self.tokens.get(self.pos).map(|t| &t.kind) {
                        Some(TokenKind::Chain(chain)) => {
                            let chain = chain.clone();
                            self.pos += 1;
                            Arg::Chain(pipe, chain)
                        }
                        _ => Arg::Pipe(pipe),
                    }
                }
                other => {
                    return Err(self.error(
                        token.line,
                        format!("unexpected {} in operand", other.describe()),
                    ))
                }
            };
            args.push(arg);
        }
        if args.is_empty() {
            return Err(self.error(line, format!("missing value for {}", context)));
        }
        Ok(Command { line, args })
    }
}
