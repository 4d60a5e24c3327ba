//! Terminal output for grading results.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::failure::GradingFailure;
use crate::session::Grade;

/// Print a grade for humans. An incorrect grade with a highlight renders as
/// a full diagnostic pointing into the submission.
pub fn print_grade(grade: &Grade, submission: &str, color: bool) {
    if grade.correct {
        print_line(Color::Green, "correct", &grade.message, color);
        return;
    }

    if let Some(span) = grade.highlight {
        let failure = GradingFailure::new(grade.message.clone())
            .with_highlight(Some(span))
            .with_source("submission", submission);
        let report = miette::Report::new(failure);
        eprintln!("{:?}", report);
        return;
    }
    print_line(Color::Red, "incorrect", &grade.message, color);
}

pub fn print_error(message: &str, color: bool) {
    print_line(Color::Red, "error", message, color);
}

fn print_line(color: Color, tag: &str, message: &str, use_color: bool) {
    let choice = if use_color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stderr = StandardStream::stderr(choice);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(stderr, "{}", tag);
    let _ = stderr.reset();
    let _ = writeln!(stderr, ": {}", message);
}
