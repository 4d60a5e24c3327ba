//! Context-variable checks and `with` scoping.
//!
//! `has_context` verifies that the student binds the same context variables
//! the solution does, dispatching on the kind of construct in focus.
//! `set_context` and `set_env` fix the values those variables take, so
//! behavioral checks downstream evaluate under a chosen binding.
//! `with_context` enters a `with` statement's resources in both processes,
//! runs sub-checks inside that scope, and tears the scope down again no
//! matter how the checks went.

use std::rc::Rc;

use crate::check::parts::check_part_index;
use crate::check::{logic, Check, CheckResult, State};
use crate::failure::{AuthoringError, Failure};
use crate::feedback::{ordinal, FeedbackComponent};
use crate::runtime::{RuntimeError, Value, WithItem};
use crate::syntax::{NodeKind, Part, PartIndex};

const EXACT_NAMES_MSG: &str = "Make sure to use the correct context variables. \
     Did you use `{{sol_vars}}` instead of `{{stu_vars}}`?";
const NAME_COUNT_MSG: &str = "Make sure to use the correct number of context variables. \
     Did you use {{sol_count}} instead of {{stu_count}}?";

/// Check the context variables bound by the construct in focus.
///
/// With-statements are checked slot by slot; every other construct compares
/// the target variables of the focused fragments directly.
pub fn has_context(state: &Rc<State>, incorrect_msg: Option<&str>, exact_names: bool) -> CheckResult {
    if state.node_kind == NodeKind::With {
        return has_with_context(state, incorrect_msg, exact_names);
    }
    compare_target_vars(state, incorrect_msg, exact_names)
}

fn compare_target_vars(
    state: &Rc<State>,
    incorrect_msg: Option<&str>,
    exact_names: bool,
) -> CheckResult {
    let sol_vars = &state.solution.target_vars;
    let stu_vars = &state.student.target_vars;

    if exact_names {
        if sol_vars != stu_vars {
            let template = incorrect_msg.unwrap_or(EXACT_NAMES_MSG);
            return Err(state.report(
                FeedbackComponent::new(template)
                    .with("sol_vars", sol_vars.join(", "))
                    .with("stu_vars", stu_vars.join(", ")),
            ));
        }
    } else if sol_vars.len() != stu_vars.len() {
        let template = incorrect_msg.unwrap_or(NAME_COUNT_MSG);
        return Err(state.report(
            FeedbackComponent::new(template)
                .with("sol_count", sol_vars.len().to_string())
                .with("stu_count", stu_vars.len().to_string()),
        ));
    }
    Ok(Rc::clone(state))
}

fn has_with_context(
    state: &Rc<State>,
    incorrect_msg: Option<&str>,
    exact_names: bool,
) -> CheckResult {
    let slots = context_slot_count(&state.solution.parts.get("context"));
    for i in 0..slots {
        let label = format!("{} context", ordinal(i + 1));
        let child = check_part_index(state, "context", &PartIndex::Pos(i), &label, None, None)?;
        compare_target_vars(&child, incorrect_msg, exact_names)?;
    }
    Ok(Rc::clone(state))
}

fn context_slot_count(part: &Option<&Part>) -> usize {
    match part {
        Some(Part::Seq(items)) => items.len(),
        _ => 0,
    }
}

// ============================================================================
// FIXING CONTEXT AND ENVIRONMENT VALUES
// ============================================================================

/// Fix the values of the context variables bound by the construct in focus,
/// for every check run from the returned state.
///
/// Positional values are zipped with each side's own target variables, so a
/// student who renamed a loop variable still gets the same value under their
/// own name. Named values address the solution's variable names and are
/// mapped to the student's variable in the same position.
pub fn set_context(
    state: &Rc<State>,
    vals: &[Value],
    names: &[(String, Value)],
) -> CheckResult {
    let sol_vars = &state.solution.target_vars;
    let stu_vars = &state.student.target_vars;

    if vals.len() > sol_vars.len() {
        return Err(Failure::Authoring(AuthoringError::new(format!(
            "`set_context` got {} values, but the focused fragment only binds {}",
            vals.len(),
            sol_vars.len()
        ))));
    }

    let zip = |vars: &[String]| -> Vec<(String, Option<Value>)> {
        vars.iter()
            .zip(vals.iter())
            .map(|(name, value)| (name.clone(), Some(value.clone())))
            .collect()
    };
    let mut sol_bindings = zip(sol_vars);
    let mut stu_bindings = zip(stu_vars);

    for (name, value) in names {
        let Some(position) = sol_vars.iter().position(|v| v == name) else {
            return Err(Failure::Authoring(AuthoringError::new(format!(
                "`set_context` got `{}`, but the focused fragment binds `{}`",
                name,
                sol_vars.join(", ")
            ))));
        };
        sol_bindings.push((name.clone(), Some(value.clone())));
        if let Some(stu_name) = stu_vars.get(position) {
            stu_bindings.push((stu_name.clone(), Some(value.clone())));
        }
    }

    Ok(state
        .child()
        .solution_context(state.solution_context.update(sol_bindings))
        .student_context(state.student_context.update(stu_bindings))
        .build())
}

/// Install extra variable bindings for every check run from the returned
/// state, identically on both sides.
pub fn set_env(state: &Rc<State>, vars: &[(String, Value)]) -> CheckResult {
    let bindings: Vec<(String, Option<Value>)> = vars
        .iter()
        .map(|(name, value)| (name.clone(), Some(value.clone())))
        .collect();
    Ok(state
        .child()
        .solution_env(state.solution_env.update(bindings.clone()))
        .student_env(state.student_env.update(bindings))
        .build())
}

// ============================================================================
// WITH SCOPING
// ============================================================================

/// Run sub-checks inside the focused `with` statement's scope.
///
/// The solution's resources are entered first; a failure there is an
/// exercise defect. The student's resources are entered next, with targeted
/// messages for protocol and unpacking mistakes. Both scopes are torn down
/// afterwards regardless of the check outcome, and a teardown failure takes
/// precedence over it.
pub fn with_context(state: &Rc<State>, checks: &[Check]) -> CheckResult {
    state.assert_is(&[NodeKind::With], "with_context")?;

    let solution_items = with_items(&state.solution.parts.get("context"));
    let student_items = with_items(&state.student.parts.get("context"));

    state
        .solution_process
        .borrow_mut()
        .enter_with(&solution_items)
        .map_err(|e| {
            Failure::Authoring(AuthoringError::new(format!(
                "entering the `with` statement in the solution errored: `{}`",
                e
            )))
        })?;

    if let Err(e) = state.student_process.borrow_mut().enter_with(&student_items) {
        let _ = state.solution_process.borrow_mut().exit_with();
        return Err(state.report(student_setup_message(&e)));
    }

    let result = logic::multi(state, checks);

    let student_exit = state.student_process.borrow_mut().exit_with();
    let solution_exit = state.solution_process.borrow_mut().exit_with();

    if let Err(e) = solution_exit {
        return Err(Failure::Authoring(AuthoringError::new(format!(
            "closing the `with` statement in the solution errored: `{}`",
            e
        ))));
    }
    if let Err(e) = student_exit {
        return Err(state.report(
            FeedbackComponent::new(
                "Your `with` statement could not be closed off correctly: `{{message}}`.",
            )
            .with("message", e.to_string()),
        ));
    }
    result.map(|_| Rc::clone(state))
}

fn with_items(part: &Option<&Part>) -> Vec<WithItem> {
    let Some(Part::Seq(items)) = part else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Part::as_fragment)
        .map(|fragment| WithItem {
            binding: fragment.node.clone(),
        })
        .collect()
}

fn student_setup_message(error: &RuntimeError) -> FeedbackComponent {
    match error {
        RuntimeError::Protocol(type_name) => FeedbackComponent::new(
            "Your `with` statement binds something that is not a resource (found a {{type}}).",
        )
        .with("type", *type_name),
        RuntimeError::Unpack { want, got } => FeedbackComponent::new(
            "In your `with` statement, you try to bind {{want}} names \
             but the resource yields {{got}} values.",
        )
        .with("want", want.to_string())
        .with("got", got.to_string()),
        other => FeedbackComponent::new("Running the `with` statement generated an error: `{{message}}`.")
            .with("message", other.to_string()),
    }
}
