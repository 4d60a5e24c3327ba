//! Command-line interface: load an exercise, grade a submission, report.

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use crate::session::{grade_submission, Exercise};

pub mod output;

#[derive(Parser, Debug)]
#[command(
    name = "rubric",
    version,
    about = "Grade a submission against an exercise definition"
)]
pub struct Cli {
    /// Exercise definition file (JSON).
    pub exercise: PathBuf,

    /// Submission file to grade.
    pub submission: PathBuf,

    /// Emit the grade as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Disable colored output.
    #[arg(long)]
    pub no_color: bool,
}

/// Exit codes: 0 correct, 1 incorrect, 2 exercise or I/O problem.
pub fn run() -> i32 {
    let cli = Cli::parse();
    match execute(&cli) {
        Ok(code) => code,
        Err(message) => {
            output::print_error(&message, !cli.no_color);
            2
        }
    }
}

fn execute(cli: &Cli) -> Result<i32, String> {
    let exercise_text = fs::read_to_string(&cli.exercise)
        .map_err(|e| format!("could not read {}: {}", cli.exercise.display(), e))?;
    let exercise: Exercise = serde_json::from_str(&exercise_text)
        .map_err(|e| format!("could not parse {}: {}", cli.exercise.display(), e))?;
    let submission = fs::read_to_string(&cli.submission)
        .map_err(|e| format!("could not read {}: {}", cli.submission.display(), e))?;

    let grade = grade_submission(&exercise, &submission)
        .map_err(|e| format!("exercise error: {}", e))?;

    if cli.json {
        let rendered = serde_json::to_string_pretty(&grade)
            .map_err(|e| format!("could not serialize the grade: {}", e))?;
        println!("{}", rendered);
    } else {
        output::print_grade(&grade, &submission, !cli.no_color);
    }
    Ok(if grade.correct { 0 } else { 1 })
}
