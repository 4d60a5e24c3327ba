//! Chain composers.

use std::rc::Rc;

use crate::check::{Check, CheckResult, State};
use crate::failure::Failure;
use crate::feedback::FeedbackComponent;

/// Run every check against the same input state.
///
/// All siblings run even after one fails, so authoring mistakes in later
/// branches surface on the first submission rather than the first failing
/// one. The first grading failure becomes the result; an authoring error
/// aborts immediately. On success the input state is returned unchanged.
pub fn multi(state: &Rc<State>, checks: &[Check]) -> CheckResult {
    let mut first_failure: Option<Failure> = None;
    for check in checks {
        match check(state) {
            Ok(_) => {}
            Err(failure @ Failure::Authoring(_)) => return Err(failure),
            Err(failure) => {
                if first_failure.is_none() {
                    first_failure = Some(failure);
                }
            }
        }
    }
    match first_failure {
        Some(failure) => Err(failure),
        None => Ok(Rc::clone(state)),
    }
}

/// Thread the state through the checks left to right, stopping at the first
/// failure. Returns the final state, so narrowing accumulates.
pub fn extend(state: &Rc<State>, checks: &[Check]) -> CheckResult {
    let mut current = Rc::clone(state);
    for check in checks {
        current = check(&current)?;
    }
    Ok(current)
}

/// Always fail. Useful while authoring an exercise incrementally.
pub fn fail(state: &Rc<State>, msg: Option<&str>) -> CheckResult {
    Err(state.report(FeedbackComponent::new(msg.unwrap_or("fail"))))
}
