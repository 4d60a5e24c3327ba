//! Function signature introspection and argument binding.
//!
//! A [`ParamSig`] describes a callable's parameter list: required names,
//! optional names with default expressions, and an optional rest parameter
//! collecting surplus positional arguments. Signatures come from parsing a
//! `def`/`lambda` parameter list, or from a manual table for builtins whose
//! signatures cannot be introspected from source.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::syntax::{ArgKey, ArgMap, AstNode, Expr, Part};

/// A callable's parameter list.
#[derive(Debug, Clone, Default)]
pub struct ParamSig {
    pub required: Vec<String>,
    /// Optional parameters with their default expressions. Manual-table
    /// entries have no default node.
    pub optional: Vec<(String, Option<AstNode>)>,
    /// Name of the rest parameter, without the `*` marker.
    pub rest: Option<String>,
}

#[derive(Debug, Clone, Error)]
#[error("invalid parameter list: {0}")]
pub struct SignatureError(pub String);

impl ParamSig {
    /// Parse the parameter list node of a `def` or `lambda` form.
    ///
    /// `(a b (c 3) *rest)` yields required `a b`, optional `c` with default
    /// `3`, and rest parameter `rest`.
    pub fn parse(params_node: &AstNode) -> Result<ParamSig, SignatureError> {
        let Expr::List(params) = &*params_node.value else {
            return Err(SignatureError(format!(
                "expected a parameter list, found {}",
                params_node.value.type_name()
            )));
        };

        let mut sig = ParamSig::default();
        for param in params {
            if sig.rest.is_some() {
                return Err(SignatureError(
                    "rest parameter must come last".to_string(),
                ));
            }
            match &*param.value {
                Expr::Symbol(name) if name.starts_with('*') => {
                    let name = &name[1..];
                    if name.is_empty() {
                        return Err(SignatureError("rest parameter needs a name".to_string()));
                    }
                    sig.rest = Some(name.to_string());
                }
                Expr::Symbol(name) => {
                    if !sig.optional.is_empty() {
                        return Err(SignatureError(format!(
                            "required parameter `{}` after an optional one",
                            name
                        )));
                    }
                    sig.required.push(name.clone());
                }
                Expr::List(pair) if pair.len() == 2 => match &*pair[0].value {
                    Expr::Symbol(name) => {
                        sig.optional.push((name.clone(), Some(pair[1].clone())));
                    }
                    other => {
                        return Err(SignatureError(format!(
                            "expected a parameter name, found {}",
                            other.type_name()
                        )))
                    }
                },
                other => {
                    return Err(SignatureError(format!(
                        "expected a parameter, found {}",
                        other.type_name()
                    )))
                }
            }
        }
        Ok(sig)
    }

    /// Positional parameter names in signature order, rest excluded.
    pub fn positional_names(&self) -> Vec<&str> {
        self.required
            .iter()
            .map(String::as_str)
            .chain(self.optional.iter().map(|(n, _)| n.as_str()))
            .collect()
    }
}

// ============================================================================
// MANUAL SIGNATURES
// ============================================================================

thread_local! {
static MANUAL_SIGNATURES: Lazy<HashMap<&'static str, ParamSig>> = Lazy::new(|| {
    fn sig(required: &[&str], optional: &[&str], rest: Option<&str>) -> ParamSig {
        ParamSig {
            required: required.iter().map(|s| s.to_string()).collect(),
            optional: optional.iter().map(|s| (s.to_string(), None)).collect(),
            rest: rest.map(String::from),
        }
    }

    let mut table = HashMap::new();
    table.insert("print", sig(&[], &[], Some("values")));
    table.insert("str", sig(&["x"], &[], None));
    table.insert("len", sig(&["x"], &[], None));
    table.insert("abs", sig(&["x"], &[], None));
    table.insert("not", sig(&["x"], &[], None));
    table.insert("list", sig(&[], &[], Some("items")));
    table.insert("nth", sig(&["items", "index"], &[], None));
    table.insert("push", sig(&["items", "value"], &[], None));
    table.insert("sum", sig(&["items"], &[], None));
    table.insert("min", sig(&[], &[], Some("values")));
    table.insert("max", sig(&[], &[], Some("values")));
    table.insert("range", sig(&["start"], &["stop", "step"], None));
    table.insert("error", sig(&["message"], &[], None));
    table.insert("resource", sig(&[], &[], Some("values")));
    table.insert("broken-resource", sig(&[], &[], Some("values")));
    table.insert("math.floor", sig(&["x"], &[], None));
    table.insert("math.ceil", sig(&["x"], &[], None));
    table.insert("math.sqrt", sig(&["x"], &[], None));
    table.insert("math.pow", sig(&["base", "exponent"], &[], None));
    table.insert("string.upper", sig(&["s"], &[], None));
    table.insert("string.lower", sig(&["s"], &[], None));
    table.insert("string.join", sig(&["separator", "items"], &[], None));
    table
});
}

/// Signature of a builtin, for callables the runtime cannot introspect.
pub fn manual_signature(full_name: &str) -> Option<ParamSig> {
    MANUAL_SIGNATURES.with(|sigs| sigs.get(full_name).cloned())
}

// ============================================================================
// STRUCTURAL BINDING
// ============================================================================

/// Why a call site does not fit a signature.
#[derive(Debug, Clone, Error)]
pub enum BindError {
    #[error("too many positional arguments: expected at most {max}, got {got}")]
    TooManyPositional { max: usize, got: usize },
    #[error("unexpected keyword argument `{0}`")]
    UnknownKeyword(String),
    #[error("argument `{0}` passed both positionally and by keyword")]
    Duplicate(String),
    #[error("missing required argument `{0}`")]
    MissingRequired(String),
}

/// Bind a call site's argument parts against a signature.
///
/// The result maps every bound argument by parameter name, in signature
/// order, so a narrowed argument is addressable both by name and by its
/// signature position. Surplus positional arguments land in a sequence under
/// the rest parameter's name.
pub fn bind_args(sig: &ParamSig, call_args: &ArgMap) -> Result<ArgMap, BindError> {
    let names = sig.positional_names();
    let mut by_name: Vec<(String, Part)> = Vec::new();
    let mut rest_parts: Vec<Part> = Vec::new();

    for (key, part) in &call_args.entries {
        match key {
            ArgKey::Pos(i) => match names.get(*i) {
                Some(name) => by_name.push((name.to_string(), part.clone())),
                None if sig.rest.is_some() => rest_parts.push(part.clone()),
                None => {
                    let got = call_args
                        .entries
                        .iter()
                        .filter(|(k, _)| matches!(k, ArgKey::Pos(_)))
                        .count();
                    return Err(BindError::TooManyPositional {
                        max: names.len(),
                        got,
                    });
                }
            },
            ArgKey::Name(keyword) => {
                if !names.iter().any(|n| *n == keyword.as_str()) {
                    return Err(BindError::UnknownKeyword(keyword.clone()));
                }
                if by_name.iter().any(|(n, _)| n == keyword) {
                    return Err(BindError::Duplicate(keyword.clone()));
                }
                by_name.push((keyword.clone(), part.clone()));
            }
        }
    }

    for required in &sig.required {
        if !by_name.iter().any(|(n, _)| n == required) {
            return Err(BindError::MissingRequired(required.clone()));
        }
    }

    let mut bound = ArgMap::new();
    for name in names {
        if let Some((_, part)) = by_name.iter().find(|(n, _)| n == name) {
            bound.insert(ArgKey::Name(name.to_string()), part.clone());
        }
    }
    if let Some(rest) = &sig.rest {
        bound.insert(ArgKey::Name(rest.clone()), Part::Seq(rest_parts));
    }
    Ok(bound)
}
