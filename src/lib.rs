//! Rubric: a submission-correctness-test engine.
//!
//! Rubric grades programming exercises written in a small s-expression
//! teaching language. An exercise bundles a solution, optional pre-exercise
//! code, and a declarative chain of checks. Grading walks the student and
//! solution trees side by side, narrowing the focus into loops, calls and
//! arguments, comparing structure or observed behavior at each step, and
//! accumulating the feedback trail that becomes the message when a check
//! fails.
//!
//! The crate splits into layers:
//!
//! - [`syntax`]: parsing and the structural index,
//! - [`runtime`]: the sandboxed evaluator and the process bridge,
//! - [`check`]: composable locators, evaluators and composers,
//! - [`sct`]: the declarative check format exercise files use,
//! - [`session`]: per-submission setup and the grading entry point.

pub mod check;
pub mod cli;
pub mod failure;
pub mod feedback;
pub mod runtime;
pub mod sct;
pub mod session;
pub mod syntax;

pub use check::{Check, CheckResult, State};
pub use failure::{AuthoringError, Failure, GradingFailure};
pub use sct::CheckSpec;
pub use session::{grade_submission, Exercise, Grade, Session};
