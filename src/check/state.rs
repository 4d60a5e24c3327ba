//! The focus state: what the grader is currently looking at.
//!
//! A [`State`] pairs one student fragment with the corresponding solution
//! fragment, plus everything needed to observe them: both runtime processes,
//! both structural indexes, context bindings, and the feedback accumulated
//! on the way here. States are immutable; narrowing builds a child state
//! with explicit overrides and leaves the parent untouched, so sibling
//! checks always start from identical input.

use std::cell::RefCell;
use std::rc::Rc;

use im::OrdMap;

use crate::failure::{AuthoringError, Failure, GradingFailure};
use crate::feedback::{self, FeedbackComponent};
use crate::runtime::{Process, RuntimeError, Value};
use crate::syntax::{AstNode, Fragment, NodeKind, Span, SyntaxCache, TreeIndex};

pub type SharedProcess = Rc<RefCell<Process>>;

// ============================================================================
// CONTEXT BINDINGS
// ============================================================================

/// Ordered name bindings established by enclosing constructs (loop targets,
/// with-statement targets). A `None` value is a name whose runtime value is
/// unknown, bound for name-visibility only.
#[derive(Debug, Clone, Default)]
pub struct Context {
    bindings: OrdMap<String, Option<Value>>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// A child context where the new bindings shadow existing ones.
    pub fn update(&self, new: impl IntoIterator<Item = (String, Option<Value>)>) -> Context {
        let mut bindings = self.bindings.clone();
        for (name, value) in new {
            bindings.insert(name, value);
        }
        Context { bindings }
    }

    /// The bindings with known values, ready to install in a process.
    pub fn known_values(&self) -> Vec<(String, Value)> {
        self.bindings
            .iter()
            .filter_map(|(name, value)| value.clone().map(|v| (name.clone(), v)))
            .collect()
    }
}

// ============================================================================
// FOCUS STATE
// ============================================================================

#[derive(Debug)]
pub struct State {
    pub student: Fragment,
    pub solution: Fragment,
    pub student_process: SharedProcess,
    pub solution_process: SharedProcess,
    pub student_index: Rc<TreeIndex>,
    pub solution_index: Rc<TreeIndex>,
    /// Values bound by enclosing constructs, per side.
    pub student_context: Context,
    pub solution_context: Context,
    /// Extra bindings installed by `with_context` style scoping, per side.
    pub student_env: Context,
    pub solution_env: Context,
    pub feedback_chain: Vec<FeedbackComponent>,
    pub node_kind: NodeKind,
    pub highlighting_disabled: bool,
    pub cache: Rc<RefCell<SyntaxCache>>,
    pub student_source: Rc<String>,
    pub solution_source: Rc<String>,
    /// Error the student program raised when it was run, if any.
    pub student_run_error: Option<Rc<RuntimeError>>,
    /// Back-reference for diagnostics; never consulted by checks.
    pub parent: Option<Rc<State>>,
}

impl State {
    /// The root state over both full programs.
    #[allow(clippy::too_many_arguments)]
    pub fn root(
        student_source: Rc<String>,
        solution_source: Rc<String>,
        student_nodes: &[AstNode],
        solution_nodes: &[AstNode],
        student_process: SharedProcess,
        solution_process: SharedProcess,
        cache: Rc<RefCell<SyntaxCache>>,
        seed_aliases: &OrdMap<String, String>,
        student_run_error: Option<Rc<RuntimeError>>,
    ) -> Rc<State> {
        let student = root_fragment(student_nodes, &student_source);
        let solution = root_fragment(solution_nodes, &solution_source);

        let (student_index, solution_index) = {
            let mut cache_ref = cache.borrow_mut();
            (
                cache_ref.index_for(&student.code, student_nodes, &student_source, seed_aliases),
                cache_ref.index_for(&solution.code, solution_nodes, &solution_source, seed_aliases),
            )
        };

        Rc::new(State {
            student,
            solution,
            student_process,
            solution_process,
            student_index,
            solution_index,
            student_context: Context::new(),
            solution_context: Context::new(),
            student_env: Context::new(),
            solution_env: Context::new(),
            feedback_chain: Vec::new(),
            node_kind: NodeKind::Root,
            highlighting_disabled: false,
            cache,
            student_source,
            solution_source,
            student_run_error,
            parent: None,
        })
    }

    /// Start building a child state. Only the overridden fields change.
    pub fn child(self: &Rc<State>) -> ChildBuilder {
        ChildBuilder {
            base: Rc::clone(self),
            student: None,
            solution: None,
            node_kind: None,
            append: None,
            student_context: None,
            solution_context: None,
            student_env: None,
            solution_env: None,
            highlighting_disabled: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Render the accumulated feedback chain plus a terminal message into a
    /// student-facing failure.
    pub fn report(&self, terminal: FeedbackComponent) -> Failure {
        let message = feedback::assemble(&self.feedback_chain, &terminal);
        Failure::Grading(GradingFailure::new(message).with_highlight(self.highlight_span()))
    }

    /// The student span a failure at this state should point at.
    pub fn highlight_span(&self) -> Option<Span> {
        if self.highlighting_disabled || self.is_root() {
            return None;
        }
        Some(self.student.highlight.unwrap_or(self.student.node.span))
    }

    /// Guard for checks that only make sense on the full script.
    pub fn assert_execution_root(&self, check_name: &str) -> Result<(), Failure> {
        if self.is_root() {
            return Ok(());
        }
        Err(Failure::Authoring(AuthoringError::new(format!(
            "`{}` can only be used when checking the full script",
            check_name
        ))))
    }

    /// Guard for checks that require a particular focus kind.
    pub fn assert_is(&self, kinds: &[NodeKind], check_name: &str) -> Result<(), Failure> {
        if kinds.contains(&self.node_kind) {
            return Ok(());
        }
        let allowed: Vec<&str> = kinds.iter().map(|k| k.describe()).collect();
        Err(Failure::Authoring(AuthoringError::new(format!(
            "`{}` can only be used when checking a {}, not a {}",
            check_name,
            allowed.join(" or "),
            self.node_kind.describe()
        ))))
    }
}

fn root_fragment(nodes: &[AstNode], source: &str) -> Fragment {
    let node = crate::syntax::parser::wrap_in_program(nodes.to_vec());
    let mut fragment = Fragment::new(node, source);
    fragment.code = source.to_string();
    fragment
}

// ============================================================================
// CHILD BUILDER
// ============================================================================

/// Explicit overrides for one narrowing step.
pub struct ChildBuilder {
    base: Rc<State>,
    student: Option<Fragment>,
    solution: Option<Fragment>,
    node_kind: Option<NodeKind>,
    append: Option<FeedbackComponent>,
    student_context: Option<Context>,
    solution_context: Option<Context>,
    student_env: Option<Context>,
    solution_env: Option<Context>,
    highlighting_disabled: Option<bool>,
}

impl ChildBuilder {
    pub fn student(mut self, fragment: Fragment) -> ChildBuilder {
        self.student = Some(fragment);
        self
    }

    pub fn solution(mut self, fragment: Fragment) -> ChildBuilder {
        self.solution = Some(fragment);
        self
    }

    pub fn kind(mut self, kind: NodeKind) -> ChildBuilder {
        self.node_kind = Some(kind);
        self
    }

    pub fn append(mut self, component: FeedbackComponent) -> ChildBuilder {
        self.append = Some(component);
        self
    }

    pub fn student_context(mut self, context: Context) -> ChildBuilder {
        self.student_context = Some(context);
        self
    }

    pub fn solution_context(mut self, context: Context) -> ChildBuilder {
        self.solution_context = Some(context);
        self
    }

    pub fn student_env(mut self, env: Context) -> ChildBuilder {
        self.student_env = Some(env);
        self
    }

    pub fn solution_env(mut self, env: Context) -> ChildBuilder {
        self.solution_env = Some(env);
        self
    }

    pub fn disable_highlighting(mut self) -> ChildBuilder {
        self.highlighting_disabled = Some(true);
        self
    }

    pub fn build(self) -> Rc<State> {
        let base = &self.base;

        let reindex = |fragment: &Fragment, source: &Rc<String>, seed: &Rc<TreeIndex>| {
            let statements = fragment.node.statements();
            base.cache
                .borrow_mut()
                .index_for(&fragment.code, &statements, source, &seed.aliases)
        };

        let student_index = match &self.student {
            Some(fragment) => reindex(fragment, &base.student_source, &base.student_index),
            None => Rc::clone(&base.student_index),
        };
        let solution_index = match &self.solution {
            Some(fragment) => reindex(fragment, &base.solution_source, &base.solution_index),
            None => Rc::clone(&base.solution_index),
        };

        let mut feedback_chain = base.feedback_chain.clone();
        if let Some(component) = self.append {
            feedback_chain.push(component);
        }

        Rc::new(State {
            student: self.student.unwrap_or_else(|| base.student.clone()),
            solution: self.solution.unwrap_or_else(|| base.solution.clone()),
            student_process: Rc::clone(&base.student_process),
            solution_process: Rc::clone(&base.solution_process),
            student_index,
            solution_index,
            student_context: self
                .student_context
                .unwrap_or_else(|| base.student_context.clone()),
            solution_context: self
                .solution_context
                .unwrap_or_else(|| base.solution_context.clone()),
            student_env: self.student_env.unwrap_or_else(|| base.student_env.clone()),
            solution_env: self
                .solution_env
                .unwrap_or_else(|| base.solution_env.clone()),
            feedback_chain,
            node_kind: self.node_kind.unwrap_or(base.node_kind),
            highlighting_disabled: self
                .highlighting_disabled
                .unwrap_or(base.highlighting_disabled),
            cache: Rc::clone(&base.cache),
            student_source: Rc::clone(&base.student_source),
            solution_source: Rc::clone(&base.solution_source),
            student_run_error: base.student_run_error.clone(),
            parent: Some(Rc::clone(base)),
        })
    }
}
