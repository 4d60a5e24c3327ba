//! Syntax layer for the Rubric teaching language.
//!
//! Provides the core AST types with source location tracking, the pest-based
//! parser, and the structural index used to locate syntactic roles (loop
//! bodies, call arguments, context managers, ...) inside a parsed tree.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub mod index;
pub mod parser;

pub use index::{ArgKey, ArgMap, Fragment, NodeKind, Part, PartIndex, PartMap, SyntaxCache, TreeIndex};
pub use parser::{parse, ParseError, ParseErrorKind};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A byte range in the source text.
///
/// All AST nodes carry a span so failures can point at the exact code the
/// grader was looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Wrapper carrying a source span with any value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithSpan<T> {
    pub value: T,
    pub span: Span,
}

/// Canonical AST node type with shared ownership, so narrowing into a
/// sub-expression never copies the subtree.
pub type AstNode = WithSpan<Rc<Expr>>;

/// An expression of the teaching language.
///
/// The language is s-expression based: every compound construct (`for`,
/// `with`, `def`, calls, ...) is a `List` whose head symbol decides its
/// meaning. Structure recognition lives in [`index`], evaluation in
/// [`crate::runtime::eval`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    List(Vec<AstNode>),
    Symbol(String),
    /// `:name`, used for keyword arguments in calls.
    Keyword(String),
    Str(String),
    Number(f64),
    Bool(bool),
}

impl Expr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::List(_) => "list",
            Expr::Symbol(_) => "symbol",
            Expr::Keyword(_) => "keyword",
            Expr::Str(_) => "string",
            Expr::Number(_) => "number",
            Expr::Bool(_) => "boolean",
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AstNode]> {
        match self {
            Expr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Pretty-prints the expression in canonical form, ignoring spans.
    pub fn pretty(&self) -> String {
        match self {
            Expr::List(items) => {
                let inner = items
                    .iter()
                    .map(|n| n.value.pretty())
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("({})", inner)
            }
            Expr::Symbol(s) => s.clone(),
            Expr::Keyword(k) => format!(":{}", k),
            Expr::Str(s) => format!("\"{}\"", s),
            Expr::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Expr::Bool(b) => b.to_string(),
        }
    }
}

impl AstNode {
    /// True for a `(do ...)` wrapper produced by [`parser::wrap_in_program`].
    pub fn is_program_wrapper(&self) -> bool {
        match &*self.value {
            Expr::List(items) => matches!(
                items.first().map(|h| &*h.value),
                Some(Expr::Symbol(s)) if s == "do"
            ),
            _ => false,
        }
    }

    /// The statements of this node: the wrapped sequence for a program
    /// wrapper, the node itself otherwise.
    pub fn statements(&self) -> Vec<AstNode> {
        match &*self.value {
            Expr::List(items) if self.is_program_wrapper() => items[1..].to_vec(),
            _ => vec![self.clone()],
        }
    }
}

// ============================================================================
// CANONICAL STRUCTURAL REPRESENTATION
// ============================================================================

/// Canonical structural dump of a tree fragment, used for structural
/// equivalence checks.
///
/// The incidental program wrapper around a single statement is stripped
/// before dumping, so a bare expression and the same expression wrapped as a
/// one-statement program compare equal.
pub fn ast_dump(node: &AstNode) -> String {
    strip_wrapper(node).value.pretty()
}

fn strip_wrapper(node: &AstNode) -> AstNode {
    let mut current = node.clone();
    loop {
        let inner = match &*current.value {
            Expr::List(items) if current.is_program_wrapper() && items.len() == 2 => {
                items[1].clone()
            }
            _ => return current,
        };
        current = inner;
    }
}

/// Extract the exact source slice a node spans.
pub fn source_slice(source: &str, span: Span) -> String {
    source
        .get(span.start..span.end.min(source.len()))
        .unwrap_or("")
        .to_string()
}
