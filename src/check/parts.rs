//! Structural locators: narrowing the focus into parts and constructs.
//!
//! All locators follow the same error policy. A miss on the solution side is
//! an authoring error, because the solution must contain everything its own
//! checks look for. A miss on the student side is ordinary grading feedback,
//! rendered from the accumulated chain.

use std::rc::Rc;

use crate::check::{CheckResult, State};
use crate::failure::{AuthoringError, Failure};
use crate::feedback::{assemble, ordinal, FeedbackComponent};
use crate::syntax::{Fragment, NodeKind, Part, PartIndex, Span, WithSpan};

const DEFAULT_PART_MISSING: &str = "Are you sure you defined the {{label}}?";
const DEFAULT_PART_EXPAND: &str = "Did you check the {{label}}?";
const DEFAULT_NODE_MISSING: &str =
    "The checker wanted to look at the {{label}}, but your submission does not contain it.";
const DEFAULT_NODE_EXPAND: &str = "Check the {{label}}.";

/// Narrow into a named sub-part of the current focus (loop body, test,
/// iterated expression, ...).
pub fn check_part(
    state: &Rc<State>,
    name: &str,
    label: &str,
    missing_msg: Option<&str>,
    expand_msg: Option<&str>,
) -> CheckResult {
    let index = PartIndex::Key(name.to_string());
    locate(state, &index, label, missing_msg, expand_msg, None, lookup_own_part)
}

/// Narrow into an indexed sub-part: by position, by key, or by a path.
pub fn check_part_index(
    state: &Rc<State>,
    name: &str,
    index: &PartIndex,
    label: &str,
    missing_msg: Option<&str>,
    expand_msg: Option<&str>,
) -> CheckResult {
    let full = PartIndex::Path(vec![PartIndex::Key(name.to_string()), index.clone()]);
    locate(state, &full, label, missing_msg, expand_msg, None, lookup_own_part)
}

/// Narrow into the nth construct of a syntactic kind, found through the
/// structural index of each side. The child state is tagged with the kind.
pub fn check_node(
    state: &Rc<State>,
    kind: NodeKind,
    index: &PartIndex,
    label: Option<&str>,
    missing_msg: Option<&str>,
    expand_msg: Option<&str>,
) -> CheckResult {
    let label = match label {
        Some(l) => l.to_string(),
        None => default_node_label(kind, index),
    };
    let lookup = move |state: &State, index: &PartIndex, solution: bool| {
        let tree = if solution {
            &state.solution_index
        } else {
            &state.student_index
        };
        tree.of_kind(kind).and_then(|part| part.get(index).cloned())
    };
    locate(
        state,
        index,
        &label,
        missing_msg.or(Some(DEFAULT_NODE_MISSING)),
        expand_msg.or(Some(DEFAULT_NODE_EXPAND)),
        Some(kind),
        lookup,
    )
}

/// Human wording for the nth construct of a kind: "2nd for loop",
/// "function definition of `add`".
pub fn default_node_label(kind: NodeKind, index: &PartIndex) -> String {
    match index {
        PartIndex::Pos(i) => format!("{} {}", ordinal(i + 1), kind.describe()),
        PartIndex::Key(name) => format!("{} of `{}`", kind.describe(), name),
        PartIndex::Path(_) => kind.describe().to_string(),
    }
}

// ============================================================================
// SHARED LOCATOR MACHINERY
// ============================================================================

fn lookup_own_part(state: &State, index: &PartIndex, solution: bool) -> Option<Part> {
    let fragment = if solution {
        &state.solution
    } else {
        &state.student
    };
    Part::Node(fragment.clone()).get(index).cloned()
}

fn locate(
    state: &Rc<State>,
    index: &PartIndex,
    label: &str,
    missing_msg: Option<&str>,
    expand_msg: Option<&str>,
    kind: Option<NodeKind>,
    lookup: impl Fn(&State, &PartIndex, bool) -> Option<Part>,
) -> CheckResult {
    let missing = FeedbackComponent::new(missing_msg.unwrap_or(DEFAULT_PART_MISSING))
        .with("label", label);
    let expand =
        FeedbackComponent::new(expand_msg.unwrap_or(DEFAULT_PART_EXPAND)).with("label", label);

    let solution_part = lookup(state, index, true)
        .and_then(|part| part_to_fragment(&part))
        .ok_or_else(|| solution_miss(state, &missing))?;

    let student_part = lookup(state, index, false)
        .and_then(|part| part_to_fragment(&part))
        .ok_or_else(|| state.report(missing.clone()))?;

    let mut child = state
        .child()
        .student(student_part)
        .solution(solution_part)
        .append(expand);
    if let Some(kind) = kind {
        child = child.kind(kind);
    }
    Ok(child.build())
}

/// Convert a located part into a focusable fragment. Textual parts (names)
/// become synthetic symbol fragments so structural comparison still works;
/// sequences and argument maps need a further index and are not focusable.
pub(crate) fn part_to_fragment(part: &Part) -> Option<Fragment> {
    match part {
        Part::Node(fragment) => Some(fragment.clone()),
        Part::Text(text) => Some(synthetic_fragment(text)),
        Part::Seq(_) | Part::Args(_) => None,
    }
}

fn synthetic_fragment(text: &str) -> Fragment {
    let node = WithSpan {
        value: Rc::new(crate::syntax::Expr::Symbol(text.to_string())),
        span: Span::default(),
    };
    Fragment {
        node,
        code: text.to_string(),
        parts: Default::default(),
        target_vars: Vec::new(),
        highlight: None,
    }
}

/// A solution-side miss, rendered with the same accumulated chain the
/// student message would have used.
pub(crate) fn solution_miss(state: &State, terminal: &FeedbackComponent) -> Failure {
    let message = assemble(&state.feedback_chain, terminal);
    Failure::Authoring(AuthoringError::on_solution(message))
}
