//! Function call checks: locating calls, binding arguments, re-calling
//! definitions.

use std::rc::Rc;

use crate::check::parts::{check_part_index, solution_miss};
use crate::check::{CheckResult, State};
use crate::failure::{AuthoringError, Failure};
use crate::feedback::{ordinal, times, FeedbackComponent};
use crate::runtime::signature::{bind_args, ParamSig};
use crate::syntax::{Expr, Fragment, NodeKind, Part, PartIndex, WithSpan};

const PARAMS_NOT_MATCHED: &str =
    "Something went wrong in figuring out how you specified the arguments for `{{name}}`; \
     have another look at your code and its output.";

/// Narrow into the nth call of a function.
///
/// `name` is the full name; student code reaching the same function through
/// a different alias still matches, and messages use the student's own
/// wording for it. Arguments are bound against the function's signature, so
/// the child state addresses them by parameter name.
pub fn check_function(
    state: &Rc<State>,
    name: &str,
    index: usize,
    missing_msg: Option<&str>,
    params_not_matched_msg: Option<&str>,
    expand_msg: Option<&str>,
    signature: Option<ParamSig>,
) -> CheckResult {
    let mapped = state.student_index.mapped_name(name);

    let missing = missing_component(missing_msg, &mapped, index);
    let solution_call = state
        .solution_index
        .calls(name)
        .get(index)
        .cloned()
        .ok_or_else(|| solution_miss(state, &missing))?;
    let student_call = state
        .student_index
        .calls(name)
        .get(index)
        .cloned()
        .ok_or_else(|| state.report(missing.clone()))?;

    let expand = expand_component(expand_msg, &mapped, index);
    let call_state = state
        .child()
        .student(student_call.clone())
        .solution(solution_call.clone())
        .kind(NodeKind::FunctionCall)
        .append(expand)
        .build();

    let signature = match signature {
        Some(sig) => Some(sig),
        None => state.solution_process.borrow().signature(name),
    };
    let Some(signature) = signature else {
        // No signature known: arguments stay addressable as written.
        return Ok(call_state);
    };

    let bind_side = |fragment: &Fragment| -> Result<Fragment, String> {
        let args = match fragment.part("args") {
            Some(Part::Args(args)) => args.clone(),
            _ => Default::default(),
        };
        let bound = bind_args(&signature, &args).map_err(|e| e.to_string())?;
        let mut fragment = fragment.clone();
        fragment.parts.insert("args".into(), Part::Args(bound));
        Ok(fragment)
    };

    let solution_bound = bind_side(&solution_call).map_err(|e| {
        Failure::Authoring(AuthoringError::new(format!(
            "the solution call `{}` does not match the signature of `{}`: {}",
            solution_call.code, name, e
        )))
    })?;
    let student_bound = match bind_side(&student_call) {
        Ok(fragment) => fragment,
        Err(_) => {
            let template = params_not_matched_msg.unwrap_or(PARAMS_NOT_MATCHED);
            return Err(call_state.report(FeedbackComponent::new(template).with("name", &mapped)));
        }
    };

    Ok(state
        .child()
        .student(student_bound)
        .solution(solution_bound)
        .kind(NodeKind::FunctionCall)
        .append(expand_component(expand_msg, &mapped, index))
        .build())
}

fn missing_component(custom: Option<&str>, name: &str, index: usize) -> FeedbackComponent {
    match custom {
        Some(template) => FeedbackComponent::new(template).with("name", name),
        None if index == 0 => {
            FeedbackComponent::new("Did you call `{{name}}`?").with("name", name)
        }
        None => FeedbackComponent::new("Did you call `{{name}}` at least {{times}}?")
            .with("name", name)
            .with("times", times(index + 1)),
    }
}

fn expand_component(custom: Option<&str>, name: &str, index: usize) -> FeedbackComponent {
    match custom {
        Some(template) => FeedbackComponent::new(template).with("name", name),
        None if index == 0 => {
            FeedbackComponent::new("Check your call of `{{name}}`.").with("name", name)
        }
        None => FeedbackComponent::new("Check your {{ordinal}} call of `{{name}}`.")
            .with("name", name)
            .with("ordinal", ordinal(index + 1)),
    }
}

/// Narrow into one bound argument of the call in focus.
pub fn check_args(state: &Rc<State>, index: &PartIndex, missing_msg: Option<&str>) -> CheckResult {
    let label = match index {
        PartIndex::Pos(i) => format!("{} argument", ordinal(i + 1)),
        PartIndex::Key(name) => format!("argument `{}`", name),
        PartIndex::Path(_) => "argument".to_string(),
    };
    let missing = missing_msg.unwrap_or("Did you specify the {{label}}?");
    check_part_index(state, "args", index, &label, Some(missing), None)
}

/// Re-call the function definition or lambda in focus with fixed arguments.
///
/// `callstr` is a call written against the placeholder name `f`, e.g.
/// `(f 1 2)`. The placeholder is replaced by each side's actual callable and
/// the resulting expression becomes the new focus, ready for behavioral
/// comparison.
pub fn check_call(state: &Rc<State>, callstr: &str, expand_msg: Option<&str>) -> CheckResult {
    state.assert_is(&[NodeKind::FunctionDef, NodeKind::Lambda], "check_call")?;

    let nodes = crate::syntax::parse(callstr).map_err(|e| {
        Failure::Authoring(AuthoringError::new(format!(
            "`check_call` got unparseable `callstr`: {}",
            e
        )))
    })?;
    let call = match nodes.as_slice() {
        [node] => node.clone(),
        _ => {
            return Err(Failure::Authoring(AuthoringError::new(
                "`check_call` expects exactly one call expression",
            )))
        }
    };
    let Expr::List(items) = &*call.value else {
        return Err(Failure::Authoring(AuthoringError::new(
            "`check_call` expects a call expression like `(f 1 2)`",
        )));
    };
    if !matches!(items.first().map(|h| &*h.value), Some(Expr::Symbol(s)) if s == "f") {
        return Err(Failure::Authoring(AuthoringError::new(
            "`check_call` expects the call to target the placeholder `f`",
        )));
    }

    let synthesize = |fragment: &Fragment| -> Fragment {
        let head = match fragment.part("name") {
            Some(Part::Text(name)) => WithSpan {
                value: Rc::new(Expr::Symbol(name.clone())),
                span: fragment.node.span,
            },
            _ => fragment.node.clone(),
        };
        let mut call_items = vec![head];
        call_items.extend(items[1..].iter().cloned());
        let node = WithSpan {
            value: Rc::new(Expr::List(call_items)),
            span: fragment.node.span,
        };
        let code = node.value.pretty();
        Fragment {
            node,
            code,
            parts: Default::default(),
            target_vars: Vec::new(),
            highlight: None,
        }
    };

    let expand = match expand_msg {
        Some(template) => FeedbackComponent::new(template).with("call", callstr),
        None => FeedbackComponent::new("To verify it, we reran `{{call}}`.").with("call", callstr),
    };

    Ok(state
        .child()
        .student(synthesize(&state.student))
        .solution(synthesize(&state.solution))
        .kind(NodeKind::FunctionCall)
        .append(expand)
        .build())
}
