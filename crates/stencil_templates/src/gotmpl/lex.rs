//! Lexer for the templating language.

use super::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Keyword {
    If,
    Else,
    End,
    Range,
    With,
    Define,
    Template,
    Block,
    Break,
    Continue,
}

impl Keyword {
    fn from_ident(s: &str) -> Option<Self> {
        Some(match s {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "end" => Keyword::End,
            "range" => Keyword::Range,
            "with" => Keyword::With,
            "define" => Keyword::Define,
            "template" => Keyword::Template,
            "block" => Keyword::Block,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            _ => return None,
        })
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::End => "end",
            Keyword::Range => "range",
            Keyword::With => "with",
            Keyword::Define => "define",
            Keyword::Template => "template",
            Keyword::Block => "block",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Text(String),
    LeftDelim,
    RightDelim,
    /// `.a.b` as its identifier chain.
    Field(Vec<String>),
    /// `.a.b` directly after a `)`, applied to the parenthesized value.
    Chain(Vec<String>),
    Dot,
    /// `$x.a` as `["$x", "a"]`.
    Variable(Vec<String>),
    Identifier(String),
    Keyword(Keyword),
    Bool(bool),
    Nil,
    String(String),
    Number(String),
    Pipe,
    LeftParen,
    RightParen,
    Declare,
    Assign,
    Comma,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Text(_) => "text".to_string(),
            TokenKind::LeftDelim => "\"{{\"".to_string(),
            TokenKind::RightDelim => "\"}}\"".to_string(),
            TokenKind::Field(chain) => format!("<.{}>", chain.join(".")),
            TokenKind::Chain(chain) => format!("<.{}>", chain.join(".")),
            TokenKind::Dot => "<.>".to_string(),
            TokenKind::Variable(chain) => format!("<{}>", chain.join(".")),
            TokenKind::Identifier(s) => format!("<{}>", s),
            TokenKind::Keyword(k) => format!("<{}>", k.as_str()),
            TokenKind::Bool(b) => format!("<{}>", b),
            TokenKind::Nil => "<nil>".to_string(),
            TokenKind::String(s) => format!("{:?}", s),
            TokenKind::Number(n) => format!("<{}>", n),
            TokenKind::Pipe => "\"|\"".to_string(),
            TokenKind::LeftParen => "\"(\"".to_string(),
            TokenKind::RightParen => "\")\"".to_string(),
            TokenKind::Declare => "\":=\"".to_string(),
            TokenKind::Assign => "\"=\"".to_string(),
            TokenKind::Comma => "\",\"".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

const LEFT: &str = "{{";
const RIGHT: &str = "}}";

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    trim_next_text: bool,
}

/// Tokenize a template source.
pub(crate) fn lex(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer {
        input,
        pos: 0,
        line: 1,
        tokens: Vec::new(),
        trim_next_text: false,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line,
            message: message.into(),
        }
    }

    fn emit(&mut self, kind: TokenKind, line: usize) {
        self.tokens.push(Token { kind, line });
    }

    /// Advance over `n` bytes, counting newlines.
    fn advance(&mut self, n: usize) {
        let end = (self.pos + n).min(self.input.len());
        self.line += self.input[self.pos..end].matches('\n').count();
        self.pos = end;
    }

    fn run(&mut self) -> Result<(), SyntaxError> {
        let input = self.input;
        loop {
            let next = self.rest().find(LEFT);
            let text_end = next.map_or(input.len(), |i| self.pos + i);
            let after_left = &input[text_end..];
            let trim_left = next.is_some() && has_left_trim(after_left);

            let mut text = &input[self.pos..text_end];
            if self.trim_next_text {
                text = text.trim_start_matches(is_space_char);
            }
            if trim_left {
                text = text.trim_end_matches(is_space_char);
            }
            if !text.is_empty() {
                let line = self.line + input[self.pos..text_end].find(text).map_or(0, |off| {
                    input[self.pos..self.pos + off].matches('\n').count()
                });
                self.emit(TokenKind::Text(text.to_string()), line);
            }
            self.advance(text_end - self.pos);
            self.trim_next_text = false;

            if next.is_none() {
                return Ok(());
            }

            self.advance(LEFT.len());
            if trim_left {
                self.advance(2);
            }
            if self.rest().starts_with("/*") {
                self.comment()?;
            } else {
                self.action()?;
            }
        }
    }

    fn comment(&mut self) -> Result<(), SyntaxError> {
        let Some(end) = self.rest().find("*/") else {
            return Err(self.error("unclosed comment"));
        };
        self.advance(end + 2);
        if self.rest().starts_with(" -}}") {
            self.advance(4);
            self.trim_next_text = true;
        } else if self.rest().starts_with(RIGHT) {
            self.advance(RIGHT.len());
        } else {
            return Err(self.error("comment ends before closing delimiter"));
        }
        Ok(())
    }

    fn action(&mut self) -> Result<(), SyntaxError> {
        self.emit(TokenKind::LeftDelim, self.line);
        let mut paren_depth = 0usize;

        loop {
            let before = self.pos;
            while self.peek().is_some_and(is_space) {
                self.advance(1);
            }
            let spaced = self.pos > before;

            if self.rest().starts_with(RIGHT) {
                if paren_depth > 0 {
                    return Err(self.error("unclosed left paren"));
                }
                self.advance(RIGHT.len());
                self.emit(TokenKind::RightDelim, self.line);
                return Ok(());
            }
            if spaced && self.rest().starts_with("-}}") {
                if paren_depth > 0 {
                    return Err(self.error("unclosed left paren"));
                }
                self.advance(3);
                self.emit(TokenKind::RightDelim, self.line);
                self.trim_next_text = true;
                return Ok(());
            }

            let line = self.line;
            let Some(c) = self.peek() else {
                return Err(self.error("unclosed action"));
            };
            match c {
                b'|' => {
                    self.advance(1);
                    self.emit(TokenKind::Pipe, line);
                }
                b'(' => {
                    self.advance(1);
                    paren_depth += 1;
                    self.emit(TokenKind::LeftParen, line);
                }
                b')' => {
                    if paren_depth == 0 {
                        return Err(self.error("unexpected right paren"));
                    }
                    self.advance(1);
                    paren_depth -= 1;
                    self.emit(TokenKind::RightParen, line);
                    if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(is_ident_char) {
                        let chain = self.field_chain();
                        self.emit(TokenKind::Chain(chain), line);
                    }
                }
                b',' => {
                    self.advance(1);
                    self.emit(TokenKind::Comma, line);
                }
                b':' => {
                    if self.peek_at(1) != Some(b'=') {
                        return Err(self.error("expected :="));
                    }
                    self.advance(2);
                    self.emit(TokenKind::Declare, line);
                }
                b'=' => {
                    self.advance(1);
                    self.emit(TokenKind::Assign, line);
                }
                b'"' => {
                    let s = self.quoted()?;
                    self.emit(TokenKind::String(s), line);
                }
                b'`' => {
                    let s = self.raw_quoted()?;
                    self.emit(TokenKind::String(s), line);
                }
                b'.' => {
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        let n = self.number();
                        self.emit(TokenKind::Number(n), line);
                    } else if self.peek_at(1).is_some_and(is_ident_char) {
                        let chain = self.field_chain();
                        self.emit(TokenKind::Field(chain), line);
                    } else {
                        self.advance(1);
                        self.emit(TokenKind::Dot, line);
                    }
                }
                b'$' => {
                    self.advance(1);
                    let mut name = String::from("$");
                    name.push_str(&self.identifier());
                    let mut chain = vec![name];
                    chain.extend(self.field_chain());
                    self.emit(TokenKind::Variable(chain), line);
                }
                b'0'..=b'9' => {
                    let n = self.number();
                    self.emit(TokenKind::Number(n), line);
                }
                b'-' | b'+' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit() || c == b'.') => {
                    let n = self.number();
                    self.emit(TokenKind::Number(n), line);
                }
                c if c.is_ascii_alphabetic() || c == b'_' => {
                    let word = self.identifier();
                    let kind = match word.as_str() {
                        "true" => TokenKind::Bool(true),
                        "false" => TokenKind::Bool(false),
                        "nil" => TokenKind::Nil,
                        _ => match Keyword::from_ident(&word) {
                            Some(k) => TokenKind::Keyword(k),
                            None => TokenKind::Identifier(word),
                        },
                    };
                    self.emit(kind, line);
                }
                _ => {
                    let ch = self.rest().chars().next().unwrap_or('?');
                    return Err(self.error(format!("unexpected {:?} in command", ch)));
                }
            }
        }
    }

    fn identifier(&mut self) -> String {
        let len = self.rest().bytes().take_while(|c| is_ident_char(*c)).count();
        let word = self.rest()[..len].to_string();
        self.advance(len);
        word
    }

    /// Consume zero or more `.ident` segments.
    fn field_chain(&mut self) -> Vec<String> {
        let mut chain = Vec::new();
        while self.peek() == Some(b'.') && self.peek_at(1).is_some_and(is_ident_char) {
            self.advance(1);
            chain.push(self.identifier());
        }
        chain
    }

    fn number(&mut self) -> String {
        let bytes = self.rest().as_bytes();
        let mut len = 0;
        if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
            len += 1;
        }
        while len < bytes.len() {
            let c = bytes[len];
            let exponent_sign = (c == b'-' || c == b'+')
                && len > 0
                && matches!(bytes[len - 1], b'e' | b'E')
                && !self.rest()[..len].starts_with("0x");
            if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || exponent_sign {
                len += 1;
            } else {
                break;
            }
        }
        let n = self.rest()[..len].to_string();
        self.advance(len);
        n
    }

    fn quoted(&mut self) -> Result<String, SyntaxError> {
        self.advance(1);
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.advance(i + 1);
                    return Ok(out);
                }
                '\n' => break,
                '\\' => {
                    let Some((_, e)) = chars.next() else { break };
                    out.push(match e {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' => '\\',
                        '"' => '"',
                        '\'' => '\'',
                        other => {
                            return Err(self.error(format!("invalid escape sequence \\{}", other)))
                        }
                    });
                }
                other => out.push(other),
            }
        }
        Err(self.error("unterminated quoted string"))
    }

    fn raw_quoted(&mut self) -> Result<String, SyntaxError> {
        self.advance(1);
        let Some(end) = self.rest().find('`') else {
            return Err(self.error("unterminated raw quoted string"));
        };
        let s = self.rest()[..end].to_string();
        self.advance(end + 1);
        Ok(s)
    }
}

/// Trim markers only remove ASCII space, tab, carriage return and newline.
fn is_space_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// `{{- ` trims the whitespace before the action.
fn has_left_trim(after_left: &str) -> bool {
    let bytes = after_left.as_bytes();
    bytes.len() > 3 && bytes[2] == b'-' && is_space(bytes[3])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_field_action() {
        assert_eq!(
            kinds("name: {{ .params.bar }}!"),
            vec![
                TokenKind::Text("name: ".into()),
                TokenKind::LeftDelim,
                TokenKind::Field(vec!["params".into(), "bar".into()]),
                TokenKind::RightDelim,
                TokenKind::Text("!".into()),
            ]
        );
    }

    #[test]
    fn test_lex_pipe_and_literals() {
        assert_eq!(
            kinds(r#"{{ .a | replace "." "-" | printf "%d" 12 -3 true nil `raw` }}"#),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Field(vec!["a".into()]),
                TokenKind::Pipe,
                TokenKind::Identifier("replace".into()),
                TokenKind::String(".".into()),
                TokenKind::String("-".into()),
                TokenKind::Pipe,
                TokenKind::Identifier("printf".into()),
                TokenKind::String("%d".into()),
                TokenKind::Number("12".into()),
                TokenKind::Number("-3".into()),
                TokenKind::Bool(true),
                TokenKind::Nil,
                TokenKind::String("raw".into()),
                TokenKind::RightDelim,
            ]
        );
    }

    #[test]
    fn test_lex_variables_and_keywords() {
        assert_eq!(
            kinds("{{ range $i, $v := .items }}{{ $v.name }}{{ end }}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::Keyword(Keyword::Range),
                TokenKind::Variable(vec!["$i".into()]),
                TokenKind::Comma,
                TokenKind::Variable(vec!["$v".into()]),
                TokenKind::Declare,
                TokenKind::Field(vec!["items".into()]),
                TokenKind::RightDelim,
                TokenKind::LeftDelim,
                TokenKind::Variable(vec!["$v".into(), "name".into()]),
                TokenKind::RightDelim,
                TokenKind::LeftDelim,
                TokenKind::Keyword(Keyword::End),
                TokenKind::RightDelim,
            ]
        );
    }

    #[test]
    fn test_lex_trim_markers_and_comments() {
        assert_eq!(
            kinds("a  {{- .x -}}  b {{/* note */}}c"),
            vec![
                TokenKind::Text("a".into()),
                TokenKind::LeftDelim,
                TokenKind::Field(vec!["x".into()]),
                TokenKind::RightDelim,
                TokenKind::Text("b ".into()),
                TokenKind::Text("c".into()),
            ]
        );
    }

    #[test]
    fn test_lex_trim_keeps_unicode_spaces() {
        assert_eq!(
            kinds("a\u{a0} {{- .x -}} \u{2003}b"),
            vec![
                TokenKind::Text("a\u{a0}".into()),
                TokenKind::LeftDelim,
                TokenKind::Field(vec!["x".into()]),
                TokenKind::RightDelim,
                TokenKind::Text("\u{2003}b".into()),
            ]
        );
    }

    #[test]
    fn test_lex_chain_after_paren() {
        assert_eq!(
            kinds("{{ (.params).A.B }}"),
            vec![
                TokenKind::LeftDelim,
                TokenKind::LeftParen,
                TokenKind::Field(vec!["params".into()]),
                TokenKind::RightParen,
                TokenKind::Chain(vec!["A".into(), "B".into()]),
                TokenKind::RightDelim,
            ]
        );
        assert_eq!(
            kinds("{{ (.a) .b }}")[4],
            TokenKind::Field(vec!["b".into()])
        );
    }

    #[test]
    fn test_lex_line_numbers() {
        let tokens = lex("a\nb\n{{ .x }}").unwrap();
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_lex_errors() {
        assert!(lex("{{ .x ").is_err());
        assert!(lex("{{ \"open }}").is_err());
        assert!(lex("{{/* open").is_err());
        assert!(lex("{{ (.x }}").is_err());
        assert!(lex("{{ .x) }}").is_err());
        assert!(lex("{{ # }}").is_err());
    }
}
