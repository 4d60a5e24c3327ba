//! Runtime layer: values, environments and the evaluator.
//!
//! The grading engine observes code by running it, so the runtime is built
//! for observation: every environment is a persistent `im::OrdMap` (cloning
//! one for an isolated evaluation is O(1)), output is captured rather than
//! printed, and every failure is a structured [`RuntimeError`] with a stable
//! kind string that `try`/`catch` and the grading layer can match on.

use std::fmt;
use std::rc::Rc;

use im::{OrdMap, Vector};
use thiserror::Error;

use crate::syntax::AstNode;

pub mod eval;
pub mod process;
pub mod signature;

pub use eval::Interpreter;
pub use process::{EvalMode, EvalRequest, EvalSource, Evaluated, Observation, Process, WithItem};
pub use signature::{bind_args, BindError, ParamSig};

// ============================================================================
// VALUES
// ============================================================================

/// A runtime value of the teaching language.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vector<Value>),
    Map(OrdMap<String, Value>),
    Lambda(Rc<Lambda>),
    /// A builtin, identified by its registry name.
    Native(&'static str),
    /// A context-manager value usable in `with` bindings.
    Resource(Rc<Resource>),
}

/// A user-defined function: parameter list, body statements, and the
/// environment captured at definition time.
#[derive(Debug)]
pub struct Lambda {
    pub name: Option<String>,
    pub params: AstNode,
    pub body: Vec<AstNode>,
    pub env: Environment,
}

/// A value implementing the resource protocol: entering yields its values,
/// exiting runs teardown. `fail_on_exit` models resources whose teardown
/// itself errors.
#[derive(Debug)]
pub struct Resource {
    pub values: Vector<Value>,
    pub fail_on_exit: bool,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Lambda(_) => "function",
            Value::Native(_) => "builtin",
            Value::Resource(_) => "resource",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Lambda(_) | Value::Native(_) | Value::Resource(_) => true,
        }
    }

    /// True for values with no meaningful printable form. Observing one of
    /// these in value mode yields an unrepresentable observation.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Value::Lambda(_) | Value::Native(_) | Value::Resource(_))
    }

    /// Grading representation: strings are quoted so `5` and `"5"` read
    /// differently in feedback messages.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{}\"", s),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "(list")?;
                for item in items {
                    write!(f, " {}", item.repr())?;
                }
                write!(f, ")")
            }
            Value::Map(entries) => {
                write!(f, "(map")?;
                for (k, v) in entries {
                    write!(f, " :{} {}", k, v.repr())?;
                }
                write!(f, ")")
            }
            Value::Lambda(l) => match &l.name {
                Some(name) => write!(f, "<function {}>", name),
                None => write!(f, "<lambda>"),
            },
            Value::Native(name) => write!(f, "<builtin {}>", name),
            Value::Resource(_) => write!(f, "<resource>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            (Value::Resource(a), Value::Resource(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Variable bindings. Persistent, so saving and restoring an environment
/// around an isolated evaluation is a cheap structural copy.
pub type Environment = OrdMap<String, Value>;

// ============================================================================
// RUNTIME ERRORS
// ============================================================================

/// A structured evaluation failure.
///
/// Each variant maps to a stable kind string used by `catch` clauses and by
/// grading messages. The runtime never panics on bad student code; every
/// misstep surfaces as one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("name `{0}` is not defined")]
    UndefinedName(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("arity error: {0}")]
    Arity(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("value error: {0}")]
    Value(String),
    #[error("{0} does not support the resource protocol")]
    Protocol(&'static str),
    #[error("cannot unpack {got} values into {want} names")]
    Unpack { want: usize, got: usize },
    #[error("recursion limit exceeded")]
    RecursionLimit,
    #[error("iteration limit exceeded")]
    IterationLimit,
    #[error("{0}")]
    Raised(String),
}

impl RuntimeError {
    /// The kind string `catch` clauses match against.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::UndefinedName(_) => "name-error",
            RuntimeError::Type(_) => "type-error",
            RuntimeError::Arity(_) => "arity-error",
            RuntimeError::DivisionByZero => "zero-division",
            RuntimeError::IndexOutOfBounds { .. } => "index-error",
            RuntimeError::Value(_) => "value-error",
            RuntimeError::Protocol(_) => "protocol-error",
            RuntimeError::Unpack { .. } => "unpack-error",
            RuntimeError::RecursionLimit => "recursion-error",
            RuntimeError::IterationLimit => "iteration-error",
            RuntimeError::Raised(_) => "user-error",
        }
    }
}
