//! Parser for the teaching language.
//!
//! Converts source text into AST nodes with source location tracking. This
//! parser is purely syntactic; structure recognition and grading semantics
//! live elsewhere. Parse failures are structured so the grading session can
//! tell an unbalanced-delimiter slip from a general syntax error, and can
//! downgrade student-side failures to ordinary grading feedback.

use std::rc::Rc;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::syntax::{AstNode, Expr, Span, WithSpan};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct ScriptParser;

// ============================================================================
// PARSE ERRORS
// ============================================================================

/// The class of a parse failure, mirrored into user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Opening and closing parentheses do not match up.
    UnbalancedDelimiter,
    /// Any other malformed input.
    InvalidSyntax,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub span: Span,
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse source code into a sequence of top-level AST nodes.
pub fn parse(source_text: &str) -> Result<Vec<AstNode>, ParseError> {
    if source_text.trim().is_empty() {
        return Ok(vec![]);
    }

    let pairs = ScriptParser::parse(Rule::program, source_text)
        .map_err(|e| convert_parse_error(e, source_text))?;

    let program = pairs.peek().expect("pest guarantees the program rule");

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_ast_node)
        .collect()
}

/// Wrap multiple AST nodes in a `(do ...)` program form if needed.
pub fn wrap_in_program(nodes: Vec<AstNode>) -> AstNode {
    match nodes.len() {
        0 => make_list(vec![], Span::default()),
        1 => nodes.into_iter().next().expect("len checked"),
        _ => {
            let span = nodes
                .iter()
                .map(|n| n.span)
                .reduce(Span::merge)
                .unwrap_or_default();
            let mut items = Vec::with_capacity(nodes.len() + 1);
            items.push(make_symbol("do", span));
            items.extend(nodes);
            make_list(items, span)
        }
    }
}

// ============================================================================
// AST BUILDERS
// ============================================================================

fn build_ast_node(pair: Pair<Rule>) -> Result<AstNode, ParseError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::list => {
            let children: Result<Vec<_>, _> = pair.into_inner().map(build_ast_node).collect();
            Ok(make_list(children?, span))
        }

        Rule::number => {
            let text = pair.as_str();
            let value = text.parse::<f64>().map_err(|_| ParseError {
                kind: ParseErrorKind::InvalidSyntax,
                message: format!("invalid number literal `{}`", text),
                span,
            })?;
            Ok(make_node(Expr::Number(value), span))
        }

        Rule::boolean => Ok(make_node(Expr::Bool(pair.as_str() == "true"), span)),

        Rule::string => {
            let raw = pair.as_str();
            let content = unescape_string(&raw[1..raw.len() - 1], span)?;
            Ok(make_node(Expr::Str(content), span))
        }

        Rule::keyword => Ok(make_node(
            Expr::Keyword(pair.as_str()[1..].to_string()),
            span,
        )),

        Rule::symbol => Ok(make_symbol(pair.as_str(), span)),

        other => Err(ParseError {
            kind: ParseErrorKind::InvalidSyntax,
            message: format!("unexpected grammar rule `{:?}`", other),
            span,
        }),
    }
}

fn unescape_string(raw: &str, span: Span) -> Result<String, ParseError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            other => {
                return Err(ParseError {
                    kind: ParseErrorKind::InvalidSyntax,
                    message: format!("invalid string escape `\\{}`", other.unwrap_or(' ')),
                    span,
                })
            }
        }
    }
    Ok(out)
}

// ============================================================================
// HELPERS
// ============================================================================

fn make_node(expr: Expr, span: Span) -> AstNode {
    WithSpan {
        value: Rc::new(expr),
        span,
    }
}

pub(crate) fn make_symbol(name: &str, span: Span) -> AstNode {
    make_node(Expr::Symbol(name.to_string()), span)
}

pub(crate) fn make_list(items: Vec<AstNode>, span: Span) -> AstNode {
    make_node(Expr::List(items), span)
}

fn get_span(pair: &Pair<Rule>) -> Span {
    let s = pair.as_span();
    Span {
        start: s.start(),
        end: s.end(),
    }
}

fn convert_parse_error(error: pest::error::Error<Rule>, source: &str) -> ParseError {
    let pos = match error.location {
        pest::error::InputLocation::Pos(p) => p,
        pest::error::InputLocation::Span((s, _)) => s,
    };
    let span = Span {
        start: pos,
        end: (pos + 1).min(source.len()),
    };

    if let Some(message) = delimiter_imbalance(source) {
        return ParseError {
            kind: ParseErrorKind::UnbalancedDelimiter,
            message,
            span,
        };
    }

    ParseError {
        kind: ParseErrorKind::InvalidSyntax,
        message: format!("syntax error: {}", error.variant.message()),
        span,
    }
}

/// Scans for mismatched parentheses, skipping string literals and comments.
fn delimiter_imbalance(source: &str) -> Option<String> {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;

    for c in source.chars() {
        if in_comment {
            in_comment = c != '\n';
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ';' => in_comment = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Some("unbalanced delimiters: unexpected `)`".to_string());
                }
            }
            _ => {}
        }
    }

    if depth > 0 {
        Some("unbalanced delimiters: missing `)`".to_string())
    } else {
        None
    }
}
