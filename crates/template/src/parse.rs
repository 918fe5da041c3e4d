//! Template lexing and parsing
//!
//! Accepts the subset of Go template syntax that makes sense against a flat
//! string context:
//!
//! | Action                     | Renders                                   |
//! |----------------------------|-------------------------------------------|
//! | `{{.Key}}`                 | value of `Key`, empty if absent           |
//! | `{{ index . "some-key" }}` | value of a key that is not an identifier  |
//! | `{{ "text" }}`             | the literal                               |
//! | `{{ .Key \| html }}`       | value of `Key`, HTML-escaped              |
//! | `{{/* note */}}`           | nothing                                   |
//!
//! `{{- ` and ` -}}` trim the adjacent whitespace as in Go.

use crate::TemplateError;

const LEFT: &str = "{{";
const RIGHT: &str = "}}";

/// Go template keywords that need control flow or variables
const KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "template", "block", "break", "continue",
];

/// Where an action takes its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Source {
    /// Context key lookup
    Field(String),
    /// String literal
    Literal(String),
}

/// A parsed template element
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Text(String),
    Value { source: Source, html: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Dot,
    Field(String),
    Ident(String),
    Str(String),
    Pipe,
}

const fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_error(line: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Parse {
        line,
        message: message.into(),
    }
}

/// Parse a whole template into nodes.
pub(crate) fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut nodes = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;
    // line of `counted`, advanced incrementally so each byte is scanned once
    let mut line = 1;
    let mut counted = 0;

    while let Some(found) = source[pos..].find(LEFT) {
        let open = pos + found;
        line += source[counted..open].matches('\n').count();
        counted = open;

        let mut text = &source[pos..open];
        if trim_next {
            text = text.trim_start_matches(is_space);
        }

        let mut body_start = open + LEFT.len();
        let after_open = &source[body_start..];
        let trim_left =
            after_open.starts_with('-') && after_open[1..].starts_with(is_space);
        if trim_left {
            text = text.trim_end_matches(is_space);
            body_start += 1;
        }
        push_text(&mut nodes, text);

        let probe = source[body_start..].trim_start_matches(is_space);
        let (body, end, trim_right) = if probe.starts_with("/*") {
            let comment_start = source.len() - probe.len();
            let (end, trim_right) = scan_comment(source, comment_start, line)?;
            (None, end, trim_right)
        } else {
            let (body, end, trim_right) = scan_action(source, body_start, line)?;
            (Some(body), end, trim_right)
        };

        if let Some(body) = body {
            nodes.push(parse_action(body, line)?);
        }
        trim_next = trim_right;
        pos = end;
    }

    let mut tail = &source[pos..];
    if trim_next {
        tail = tail.trim_start_matches(is_space);
    }
    push_text(&mut nodes, tail);

    Ok(nodes)
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(previous)) = nodes.last_mut() {
        previous.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// Find the end of a `/* ... */` comment action starting at `start`.
///
/// Returns the offset just past the closing delimiter and whether it trims.
fn scan_comment(source: &str, start: usize, line: usize) -> Result<(usize, bool), TemplateError> {
    let Some(close) = source[start + 2..].find("*/") else {
        return Err(parse_error(line, "unclosed comment"));
    };
    let after = &source[start + 2 + close + 2..];

    let (trim_right, rest) = if let Some(stripped) = after
        .strip_prefix(|c: char| is_space(c))
        .and_then(|s| s.strip_prefix('-'))
    {
        (true, stripped)
    } else {
        (false, after)
    };

    if !rest.starts_with(RIGHT) {
        return Err(parse_error(line, "comment ends before closing delimiter"));
    }
    let end = source.len() - rest.len() + RIGHT.len();
    Ok((end, trim_right))
}

/// Find the closing delimiter of an action whose body starts at `start`.
///
/// Delimiters inside quoted strings do not close the action. Returns the
/// body, the offset just past `}}` and whether ` -}}` asked for trimming.
fn scan_action(
    source: &str,
    start: usize,
    line: usize,
) -> Result<(&str, usize, bool), TemplateError> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in source[start..].char_indices() {
        let at = start + i;
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '`' => quote = Some(c),
            '}' if source[at..].starts_with(RIGHT) => {
                let raw = &source[start..at];
                let trim_right = raw.ends_with('-') && raw[..raw.len() - 1].ends_with(is_space);
                let body = if trim_right { &raw[..raw.len() - 1] } else { raw };
                return Ok((body, at + RIGHT.len(), trim_right));
            }
            _ => {}
        }
    }

    if quote.is_some() {
        Err(parse_error(line, "unterminated quoted string"))
    } else {
        Err(parse_error(line, "unclosed action"))
    }
}

fn tokenize(body: &str, line: usize) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if is_space(c) => {}
            '|' => tokens.push(Token::Pipe),
            '"' => {
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('"') => value.push('"'),
                            Some('\\') => value.push('\\'),
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some('r') => value.push('\r'),
                            Some(other) => {
                                return Err(parse_error(
                                    line,
                                    format!("unknown escape sequence '\\{other}'"),
                                ));
                            }
                            None => return Err(parse_error(line, "unterminated quoted string")),
                        },
                        Some('\n') | None => {
                            return Err(parse_error(line, "unterminated quoted string"));
                        }
                        Some(other) => value.push(other),
                    }
                }
                tokens.push(Token::Str(value));
            }
            '`' => {
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(other) => value.push(other),
                        None => return Err(parse_error(line, "unterminated raw quoted string")),
                    }
                }
                tokens.push(Token::Str(value));
            }
            '.' => {
                if chars.peek().copied().is_some_and(is_ident_start) {
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if !is_ident_char(next) {
                            break;
                        }
                        name.push(next);
                        chars.next();
                    }
                    if chars.peek() == Some(&'.') {
                        return Err(parse_error(
                            line,
                            format!("nested field access after .{name} is not supported: the context is flat"),
                        ));
                    }
                    tokens.push(Token::Field(name));
                } else {
                    tokens.push(Token::Dot);
                }
            }
            c if is_ident_start(c) => {
                let mut name = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !is_ident_char(next) {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                tokens.push(Token::Ident(name));
            }
            '$' => return Err(parse_error(line, "template variables are not supported")),
            '(' | ')' => {
                return Err(parse_error(line, "parenthesized pipelines are not supported"));
            }
            other => {
                return Err(parse_error(
                    line,
                    format!("unexpected character '{other}' in action"),
                ));
            }
        }
    }

    Ok(tokens)
}

fn operand(token: &Token, line: usize) -> Result<Source, TemplateError> {
    match token {
        Token::Field(name) => Ok(Source::Field(name.clone())),
        Token::Str(value) => Ok(Source::Literal(value.clone())),
        Token::Dot => Err(parse_error(
            line,
            "cannot render the whole context; reference a key such as .Name",
        )),
        Token::Ident(name) => Err(unknown_function(name, line)),
        Token::Pipe => Err(parse_error(line, "missing command in pipeline")),
    }
}

fn unknown_function(name: &str, line: usize) -> TemplateError {
    if KEYWORDS.contains(&name) {
        parse_error(line, format!("unsupported action '{name}'"))
    } else {
        parse_error(line, format!("function \"{name}\" not defined"))
    }
}

fn parse_action(body: &str, line: usize) -> Result<Node, TemplateError> {
    let tokens = tokenize(body, line)?;
    if tokens.is_empty() {
        return Err(parse_error(line, "missing value for command"));
    }

    let mut commands = tokens.split(|t| *t == Token::Pipe);
    let first = commands.next().unwrap_or_default();

    let (source, mut html) = match first {
        [] => return Err(parse_error(line, "missing command in pipeline")),
        [single] => (operand(single, line)?, false),
        [Token::Ident(f), Token::Dot, Token::Str(key)] if f == "index" => {
            (Source::Field(key.clone()), false)
        }
        [Token::Ident(f), ..] if f == "index" => {
            return Err(parse_error(line, "index expects: index . \"key\""));
        }
        [Token::Ident(f), arg] if f == "html" => (operand(arg, line)?, true),
        [Token::Ident(f), ..] => return Err(unknown_function(f, line)),
        _ => return Err(parse_error(line, "too many operands in command")),
    };

    for command in commands {
        match command {
            [Token::Ident(f)] if f == "html" => html = true,
            [Token::Ident(f)] => return Err(unknown_function(f, line)),
            [] => return Err(parse_error(line, "missing command in pipeline")),
            _ => return Err(parse_error(line, "pipeline stage must be a function name")),
        }
    }

    Ok(Node::Value { source, html })
}
