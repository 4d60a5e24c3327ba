//! Failure taxonomy of the grading engine.
//!
//! Two disjoint channels, never mixed:
//!
//! - [`GradingFailure`]: the submission is wrong. Carries the rendered
//!   feedback chain and optionally a highlight into the student source.
//!   This is the normal, expected outcome of a failed check.
//! - [`AuthoringError`]: the exercise is wrong. Solution code that fails a
//!   check, malformed check specs, broken pre-exercise code. Loud, aimed at
//!   the exercise author, never shown as student feedback.

use std::fmt;

use miette::{Diagnostic, LabeledSpan, NamedSource, Severity, SourceCode, SourceSpan};
use thiserror::Error;

use crate::syntax::Span;

// ============================================================================
// GRADING FAILURES
// ============================================================================

/// A student-facing check failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GradingFailure {
    pub message: String,
    pub highlight: Option<Span>,
    src: Option<NamedSource<String>>,
}

impl GradingFailure {
    pub fn new(message: impl Into<String>) -> GradingFailure {
        GradingFailure {
            message: message.into(),
            highlight: None,
            src: None,
        }
    }

    pub fn with_highlight(mut self, highlight: Option<Span>) -> GradingFailure {
        self.highlight = highlight;
        self
    }

    /// Attach the submission source so diagnostic rendering can underline
    /// the highlighted span.
    pub fn with_source(mut self, name: &str, text: &str) -> GradingFailure {
        self.src = Some(NamedSource::new(name, text.to_string()));
        self
    }
}

impl Diagnostic for GradingFailure {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new("rubric::incorrect"))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.src.as_ref().map(|s| s as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.src.as_ref()?;
        let span = self.highlight?;
        let labeled = LabeledSpan::new_with_span(
            Some("check failed here".to_string()),
            SourceSpan::from((span.start, span.end.saturating_sub(span.start))),
        );
        Some(Box::new(std::iter::once(labeled)))
    }
}

// ============================================================================
// AUTHORING ERRORS
// ============================================================================

/// A defect in the exercise itself.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthoringError {
    pub message: String,
}

impl AuthoringError {
    pub fn new(message: impl Into<String>) -> AuthoringError {
        AuthoringError {
            message: message.into(),
        }
    }

    /// A check that does not hold on the solution side. Always an exercise
    /// defect: the solution must pass its own checks.
    pub fn on_solution(message: impl fmt::Display) -> AuthoringError {
        AuthoringError::new(format!("SCT fails on solution: {}", message))
    }
}

impl Diagnostic for AuthoringError {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new("rubric::authoring"))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new(
            "the exercise is broken; the submission was not judged",
        ))
    }
}

// ============================================================================
// COMBINED CHANNEL
// ============================================================================

/// Either failure channel, as returned by every check.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Grading(#[from] GradingFailure),
    #[error(transparent)]
    Authoring(#[from] AuthoringError),
}

impl Failure {
    pub fn authoring(message: impl Into<String>) -> Failure {
        Failure::Authoring(AuthoringError::new(message))
    }
}

impl Diagnostic for Failure {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        match self {
            Failure::Grading(f) => f.code(),
            Failure::Authoring(e) => e.code(),
        }
    }

    fn severity(&self) -> Option<Severity> {
        match self {
            Failure::Grading(f) => f.severity(),
            Failure::Authoring(e) => e.severity(),
        }
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        match self {
            Failure::Grading(f) => f.help(),
            Failure::Authoring(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        match self {
            Failure::Grading(f) => f.source_code(),
            Failure::Authoring(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Failure::Grading(f) => f.labels(),
            Failure::Authoring(e) => e.labels(),
        }
    }
}
