//! Runtime bridge between the grading layer and the evaluator.
//!
//! A [`Process`] wraps one interpreter per submission side. The grading
//! layer never calls the evaluator directly: it submits an [`EvalRequest`]
//! and gets back an [`Evaluated`] observation. Evaluation never propagates a
//! raw interpreter error upward; everything the code under test did wrong is
//! folded into the observation, so grading code can compare observations
//! without error plumbing.

use std::mem;
use std::rc::Rc;

use im::OrdMap;

use crate::runtime::eval::exit_resource;
use crate::runtime::signature::{manual_signature, ParamSig};
use crate::runtime::{Environment, Interpreter, Resource, RuntimeError, Value};
use crate::syntax::{parse, AstNode};

// ============================================================================
// REQUESTS
// ============================================================================

/// What aspect of an evaluation to observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// The resulting value.
    Value,
    /// The output the evaluation printed.
    Output,
    /// The error the evaluation raised.
    Error,
}

/// The code to evaluate: a tree fragment, or raw source text.
#[derive(Debug, Clone)]
pub enum EvalSource {
    Node(AstNode),
    Code(String),
}

/// A single evaluation order for a process.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub source: EvalSource,
    /// Source text run before the evaluation proper.
    pub pre_code: Option<String>,
    /// Extra bindings installed before running (context values included).
    pub bindings: Vec<(String, Value)>,
    /// Inspect this variable after running instead of the result value.
    pub name: Option<String>,
    /// Evaluate against a copy of the environment, discarding mutations.
    pub copy: bool,
    pub mode: EvalMode,
}

impl EvalRequest {
    pub fn node(node: AstNode, mode: EvalMode) -> EvalRequest {
        EvalRequest {
            source: EvalSource::Node(node),
            pre_code: None,
            bindings: Vec::new(),
            name: None,
            copy: true,
            mode,
        }
    }

    pub fn code(code: impl Into<String>, mode: EvalMode) -> EvalRequest {
        EvalRequest {
            source: EvalSource::Code(code.into()),
            pre_code: None,
            bindings: Vec::new(),
            name: None,
            copy: true,
            mode,
        }
    }
}

// ============================================================================
// OBSERVATIONS
// ============================================================================

/// What a process observed when running a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Value(Value),
    Output(String),
    Error { message: String, kind: &'static str },
    /// The evaluation hit a name that is not defined.
    UndefinedName(String),
    /// The result exists but has no meaningful printable form.
    Unrepresentable(String),
}

/// An observation plus its rendered representation, when one exists.
#[derive(Debug, Clone)]
pub struct Evaluated {
    pub observation: Observation,
    pub repr: Option<String>,
}

impl Evaluated {
    fn from_observation(observation: Observation) -> Evaluated {
        let repr = match &observation {
            Observation::Value(v) => Some(v.repr()),
            Observation::Output(s) => Some(s.trim().to_string()),
            Observation::Error { message, .. } => Some(message.clone()),
            Observation::UndefinedName(_) | Observation::Unrepresentable(_) => None,
        };
        Evaluated { observation, repr }
    }
}

/// One `with` binding to enter: `(name... expr)`.
#[derive(Debug, Clone)]
pub struct WithItem {
    pub binding: AstNode,
}

// ============================================================================
// PROCESS
// ============================================================================

/// One side's runtime: a persistent interpreter plus a stack of entered
/// `with` scopes.
#[derive(Debug, Default)]
pub struct Process {
    interp: Interpreter,
    with_stack: Vec<Vec<Rc<Resource>>>,
}

impl Process {
    pub fn new() -> Process {
        Process::default()
    }

    /// Run a full program in strict order, accumulating output.
    pub fn run_program(&mut self, nodes: &[AstNode]) -> Result<(), RuntimeError> {
        self.interp.run(nodes).map(|_| ())
    }

    pub fn output(&self) -> &str {
        &self.interp.output
    }

    pub fn env(&self) -> &Environment {
        &self.interp.env
    }

    pub fn aliases(&self) -> &OrdMap<String, String> {
        &self.interp.aliases
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.interp.env.get(name).cloned()
    }

    /// Introspect a callable's signature: user definitions are parsed from
    /// their parameter list, builtins come from the manual table. Qualified
    /// names are resolved through the process's alias mappings.
    pub fn signature(&self, name: &str) -> Option<ParamSig> {
        if let Some(Value::Lambda(lambda)) = self.interp.env.get(name) {
            return ParamSig::parse(&lambda.params).ok();
        }
        if let Some((head, rest)) = name.split_once('.') {
            let module = self
                .interp
                .aliases
                .get(head)
                .map(String::as_str)
                .unwrap_or(head);
            return manual_signature(&format!("{}.{}", module, rest));
        }
        manual_signature(name)
    }

    /// Evaluate a request, observing per its mode. Never returns an error:
    /// whatever went wrong is part of the observation.
    pub fn evaluate(&mut self, request: &EvalRequest) -> Evaluated {
        let saved = if request.copy {
            Some((self.interp.env.clone(), self.interp.aliases.clone()))
        } else {
            None
        };
        // Output of grading evaluations is captured separately and never
        // leaks into the submission's own output.
        let prior_output = mem::take(&mut self.interp.output);

        let observation = self.evaluate_inner(request);

        self.interp.output = prior_output;
        if let Some((env, aliases)) = saved {
            self.interp.env = env;
            self.interp.aliases = aliases;
        }
        Evaluated::from_observation(observation)
    }

    fn evaluate_inner(&mut self, request: &EvalRequest) -> Observation {
        for (name, value) in &request.bindings {
            self.interp.env.insert(name.clone(), value.clone());
        }

        if let Some(pre_code) = &request.pre_code {
            match parse(pre_code) {
                Ok(nodes) => {
                    if let Err(e) = self.interp.run(&nodes) {
                        return observe_error(e, request.mode);
                    }
                }
                Err(e) => {
                    return Observation::Error {
                        message: e.to_string(),
                        kind: "syntax-error",
                    }
                }
            }
        }

        let nodes = match &request.source {
            EvalSource::Node(node) => vec![node.clone()],
            EvalSource::Code(code) => match parse(code) {
                Ok(nodes) => nodes,
                Err(e) => {
                    return Observation::Error {
                        message: e.to_string(),
                        kind: "syntax-error",
                    }
                }
            },
        };

        let result = match self.interp.run(&nodes) {
            Ok(value) => value,
            Err(e) => return observe_error(e, request.mode),
        };

        let result = match &request.name {
            Some(name) => match self.interp.env.get(name) {
                Some(value) => value.clone(),
                None => return Observation::UndefinedName(name.clone()),
            },
            None => result,
        };

        match request.mode {
            EvalMode::Output => Observation::Output(self.interp.output.clone()),
            EvalMode::Value | EvalMode::Error => {
                if result.is_opaque() {
                    Observation::Unrepresentable(format!("a {}", result.type_name()))
                } else {
                    Observation::Value(result)
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // WITH SCOPES
    // ------------------------------------------------------------------------

    /// Enter a `with` scope: evaluate each binding's context expression and
    /// bind its yielded values. On failure, already-entered resources are
    /// torn down before the error is returned.
    pub fn enter_with(&mut self, items: &[WithItem]) -> Result<(), RuntimeError> {
        let mut entered: Vec<Rc<Resource>> = Vec::new();
        for item in items {
            match self.interp.enter_binding(&item.binding) {
                Ok(resource) => entered.push(resource),
                Err(e) => {
                    for resource in entered.iter().rev() {
                        let _ = exit_resource(resource);
                    }
                    return Err(e);
                }
            }
        }
        self.with_stack.push(entered);
        Ok(())
    }

    /// Exit the innermost `with` scope. The whole scope is torn down even if
    /// one resource's teardown fails; the last failure is reported.
    pub fn exit_with(&mut self) -> Result<(), RuntimeError> {
        let Some(entered) = self.with_stack.pop() else {
            return Ok(());
        };
        let mut teardown_error = None;
        for resource in entered.iter().rev() {
            if let Err(e) = exit_resource(resource) {
                teardown_error = Some(e);
            }
        }
        match teardown_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn observe_error(error: RuntimeError, mode: EvalMode) -> Observation {
    let kind = error.kind();
    match (mode, error) {
        (EvalMode::Error, e) => Observation::Error {
            message: e.to_string(),
            kind,
        },
        (_, RuntimeError::UndefinedName(name)) => Observation::UndefinedName(name),
        (_, e) => Observation::Error {
            message: e.to_string(),
            kind,
        },
    }
}
