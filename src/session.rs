//! Grading sessions: one submission graded against one exercise.
//!
//! A session owns everything with per-submission lifetime: both runtime
//! processes, both structural indexes, the syntax cache, and the root focus
//! state. Nothing grading-related outlives the session, so concurrent
//! sessions never share mutable state.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::check::{Check, State};
use crate::failure::{AuthoringError, Failure, GradingFailure};
use crate::runtime::Process;
use crate::sct::CheckSpec;
use crate::syntax::{parse, ParseErrorKind, Span, SyntaxCache};

/// An exercise definition, as loaded from an exercise file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    /// Code run in both processes before anything else; sets up data and
    /// module aliases the exercise relies on.
    #[serde(default)]
    pub pre_exercise_code: String,
    pub solution_code: String,
    pub sct: Vec<CheckSpec>,
}

/// The student-facing outcome of grading one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub correct: bool,
    pub message: String,
    /// Span into the submission the feedback refers to, when known.
    pub highlight: Option<Span>,
}

#[derive(Debug)]
pub struct Session {
    root: Rc<State>,
}

impl Session {
    /// Set up a session: parse both sides, run the pre-exercise code, run
    /// both programs, and build the root state.
    ///
    /// The two sides fail differently. Solution-side problems (parse errors,
    /// runtime errors, broken pre-exercise code) are authoring errors.
    /// A student parse failure is ordinary grading feedback, and a student
    /// runtime error is recorded for the checks to judge.
    pub fn new(exercise: &Exercise, student_code: &str) -> Result<Session, Failure> {
        let pre_nodes = parse(&exercise.pre_exercise_code).map_err(|e| {
            Failure::Authoring(AuthoringError::new(format!(
                "the pre-exercise code does not parse: {}",
                e
            )))
        })?;
        let solution_nodes = parse(&exercise.solution_code).map_err(|e| {
            Failure::Authoring(AuthoringError::new(format!(
                "the solution code does not parse: {}",
                e
            )))
        })?;

        let student_nodes = parse(student_code).map_err(|e| {
            let intro = match e.kind {
                ParseErrorKind::UnbalancedDelimiter => {
                    "Your code can not be executed due to unbalanced parentheses"
                }
                ParseErrorKind::InvalidSyntax => "Your code can not be executed due to a syntax error",
            };
            Failure::Grading(
                GradingFailure::new(format!("{}: {}. Fix the error and try again!", intro, e.message))
                    .with_highlight(Some(e.span)),
            )
        })?;

        let mut student_process = Process::new();
        let mut solution_process = Process::new();
        for process in [&mut student_process, &mut solution_process] {
            process.run_program(&pre_nodes).map_err(|e| {
                Failure::Authoring(AuthoringError::new(format!(
                    "running the pre-exercise code errored: `{}`",
                    e
                )))
            })?;
        }

        // Module aliases from the pre-exercise code seed both indexes, so
        // qualified names resolve identically in every tree of the session.
        let seed_aliases = solution_process.aliases().clone();

        solution_process.run_program(&solution_nodes).map_err(|e| {
            Failure::Authoring(AuthoringError::new(format!(
                "running the solution code errored: `{}`",
                e
            )))
        })?;
        let student_run_error = student_process
            .run_program(&student_nodes)
            .err()
            .map(Rc::new);

        let root = State::root(
            Rc::new(student_code.to_string()),
            Rc::new(exercise.solution_code.clone()),
            &student_nodes,
            &solution_nodes,
            Rc::new(RefCell::new(student_process)),
            Rc::new(RefCell::new(solution_process)),
            Rc::new(RefCell::new(SyntaxCache::new())),
            &seed_aliases,
            student_run_error,
        );
        Ok(Session { root })
    }

    pub fn root(&self) -> &Rc<State> {
        &self.root
    }

    /// Everything the student program printed when it ran.
    pub fn student_output(&self) -> String {
        self.root.student_process.borrow().output().to_string()
    }

    /// Run a check chain and produce the student-facing outcome.
    ///
    /// Grading failures become the feedback message. Authoring errors are
    /// returned to the caller: they are for the exercise author, and must
    /// never reach the student channel.
    pub fn grade(&self, check: &Check) -> Result<Grade, AuthoringError> {
        match check(&self.root) {
            Ok(_) => {
                // A submission that errored at runtime is never correct,
                // even when every check happened to pass.
                if let Some(error) = &self.root.student_run_error {
                    return Ok(Grade {
                        correct: false,
                        message: format!(
                            "Your code contains an error: `{}`. Fix it and try again!",
                            error
                        ),
                        highlight: None,
                    });
                }
                Ok(Grade {
                    correct: true,
                    message: "Great work!".to_string(),
                    highlight: None,
                })
            }
            Err(Failure::Grading(failure)) => Ok(Grade {
                correct: false,
                message: failure.message.clone(),
                highlight: failure.highlight,
            }),
            Err(Failure::Authoring(error)) => Err(error),
        }
    }
}

/// Grade one submission end to end: build the session, compile the
/// exercise's declarative checks, and run them.
pub fn grade_submission(exercise: &Exercise, student_code: &str) -> Result<Grade, AuthoringError> {
    let session = match Session::new(exercise, student_code) {
        Ok(session) => session,
        Err(Failure::Grading(failure)) => {
            return Ok(Grade {
                correct: false,
                message: failure.message.clone(),
                highlight: failure.highlight,
            })
        }
        Err(Failure::Authoring(error)) => return Err(error),
    };
    let check = crate::sct::compile_all(&exercise.sct);
    session.grade(&check)
}
