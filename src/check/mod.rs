//! The check layer: everything an exercise author composes into an SCT.
//!
//! A check is a function from a focus state to either a narrowed (or
//! unchanged) focus state or a [`Failure`]. Locators narrow, evaluators
//! compare, composers combine.

use std::rc::Rc;

use crate::failure::Failure;

pub mod context;
pub mod function;
pub mod has;
pub mod logic;
pub mod parts;
pub mod state;

pub use state::{Context, SharedProcess, State};

/// The outcome of one check: the state to continue from, or a failure.
pub type CheckResult = Result<Rc<State>, Failure>;

/// A composable check.
pub type Check = Rc<dyn Fn(&Rc<State>) -> CheckResult>;

/// Wrap a closure as a [`Check`].
pub fn check(f: impl Fn(&Rc<State>) -> CheckResult + 'static) -> Check {
    Rc::new(f)
}
