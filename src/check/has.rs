//! Equivalence evaluators: structural and behavioral comparison.
//!
//! `has_equal_ast` compares canonical structure. `has_expr` runs the focused
//! fragment in both processes and compares what each side observed (value,
//! output, or raised error). Both leave the focus unchanged on success, so
//! further checks continue from the same state.

use std::rc::Rc;

use regex::Regex;

use crate::check::{CheckResult, State};
use crate::failure::{AuthoringError, Failure};
use crate::feedback::{shorten, FeedbackComponent};
use crate::runtime::{EvalMode, EvalRequest, EvalSource, Evaluated, Observation, Value};
use crate::syntax::{ast_dump, parse, Fragment, Part};

/// Longest representation shown verbatim in feedback.
const REPR_LIMIT: usize = 50;

/// Placeholder in `expr_code` replaced by the focused fragment's code.
const FOCUS_PLACEHOLDER: &str = "__focus__";

// ============================================================================
// STRUCTURAL EQUIVALENCE
// ============================================================================

#[derive(Debug, Clone)]
pub struct AstOptions {
    /// Require full equality; otherwise the solution structure may appear
    /// anywhere inside the student structure.
    pub exact: bool,
    /// Compare the student fragment against this code instead of the
    /// solution fragment. Requires an explicit `incorrect_msg`.
    pub code: Option<String>,
    pub incorrect_msg: Option<String>,
}

impl Default for AstOptions {
    fn default() -> AstOptions {
        AstOptions {
            exact: true,
            code: None,
            incorrect_msg: None,
        }
    }
}

/// Compare the canonical structure of both fragments.
pub fn has_equal_ast(state: &Rc<State>, opts: &AstOptions) -> CheckResult {
    let expected = match &opts.code {
        Some(code) => {
            if opts.incorrect_msg.is_none() {
                return Err(Failure::Authoring(AuthoringError::new(
                    "`has_equal_ast` with a `code` argument requires an explicit `incorrect_msg`",
                )));
            }
            let nodes = parse(code).map_err(|e| {
                Failure::Authoring(AuthoringError::new(format!(
                    "`has_equal_ast` got unparseable `code`: {}",
                    e
                )))
            })?;
            ast_dump(&crate::syntax::parser::wrap_in_program(nodes))
        }
        None => ast_dump(&state.solution.node),
    };
    let actual = ast_dump(&state.student.node);

    let matches = if opts.exact {
        actual == expected
    } else {
        actual.contains(&expected)
    };
    if matches {
        return Ok(Rc::clone(state));
    }

    let template = opts
        .incorrect_msg
        .clone()
        .unwrap_or_else(|| "Expected `{{solution}}`, but got `{{student}}`.".to_string());
    let terminal = FeedbackComponent::new(template)
        .with("solution", shorten(&state.solution.code, REPR_LIMIT))
        .with("student", shorten(&state.student.code, REPR_LIMIT));
    Err(state.report(terminal))
}

const DEFAULT_PART_EQUAL: &str = "Are you sure you got the {{name}} right?";

/// Compare one named sub-part of both fragments structurally, without
/// changing the focus. The declarative `has_equal_name` and `is_default`
/// checks are thin wrappers over this.
pub fn has_equal_part(state: &Rc<State>, name: &str, incorrect_msg: Option<&str>) -> CheckResult {
    let solution = state.solution.part(name).ok_or_else(|| {
        Failure::Authoring(AuthoringError::new(format!(
            "`has_equal_part` checks `{}`, but the solution fragment has no such part",
            name
        )))
    })?;
    let student = state.student.part(name);

    if let Some(student) = student {
        if parts_equal(student, solution) {
            return Ok(Rc::clone(state));
        }
    }

    let sol_repr = part_repr(solution);
    let stu_repr = student.and_then(part_repr);
    let showable = matches!(
        (&sol_repr, &stu_repr),
        (Some(sol), Some(stu))
            if !sol.contains('\n') && !stu.contains('\n') && sol.len() <= REPR_LIMIT && sol != stu
    );

    let template = match incorrect_msg {
        Some(custom) => custom.to_string(),
        None if showable => format!(
            "{} Expected `{{{{sol}}}}`, but got `{{{{stu}}}}`.",
            DEFAULT_PART_EQUAL
        ),
        None => DEFAULT_PART_EQUAL.to_string(),
    };
    let mut terminal = FeedbackComponent::new(template).with("name", name);
    if let Some(sol) = sol_repr {
        terminal = terminal.with("sol", shorten(&sol, REPR_LIMIT));
    }
    if let Some(stu) = stu_repr {
        terminal = terminal.with("stu", shorten(&stu, REPR_LIMIT));
    }
    Err(state.report(terminal))
}

/// Compare how many entries a named indexed part has on each side.
pub fn has_equal_part_len(state: &Rc<State>, name: &str, unequal_msg: Option<&str>) -> CheckResult {
    let count = |part: Option<&Part>| -> Option<usize> {
        match part? {
            Part::Seq(items) => Some(items.len()),
            Part::Args(args) => Some(args.len()),
            _ => None,
        }
    };
    let expected = count(state.solution.part(name)).ok_or_else(|| {
        Failure::Authoring(AuthoringError::new(format!(
            "`has_equal_part_len` checks `{}`, but the solution fragment has no countable part with that name",
            name
        )))
    })?;
    let actual = count(state.student.part(name)).unwrap_or(0);
    if expected == actual {
        return Ok(Rc::clone(state));
    }
    let template = unequal_msg.unwrap_or(
        "Make sure to specify the correct number of {{name}}. \
         Expected {{sol_len}}, but got {{stu_len}}.",
    );
    Err(state.report(
        FeedbackComponent::new(template)
            .with("name", name)
            .with("sol_len", expected.to_string())
            .with("stu_len", actual.to_string()),
    ))
}

fn parts_equal(student: &Part, solution: &Part) -> bool {
    match (student, solution) {
        (Part::Node(a), Part::Node(b)) => ast_dump(&a.node) == ast_dump(&b.node),
        (Part::Text(a), Part::Text(b)) => a == b,
        (Part::Seq(a), Part::Seq(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| parts_equal(x, y))
        }
        (Part::Args(a), Part::Args(b)) => {
            a.entries.len() == b.entries.len()
                && a.entries
                    .iter()
                    .zip(&b.entries)
                    .all(|((ka, pa), (kb, pb))| ka == kb && parts_equal(pa, pb))
        }
        _ => false,
    }
}

fn part_repr(part: &Part) -> Option<String> {
    match part {
        Part::Node(fragment) => Some(fragment.code.clone()),
        Part::Text(text) => Some(text.clone()),
        Part::Seq(_) | Part::Args(_) => None,
    }
}

// ============================================================================
// BEHAVIORAL EQUIVALENCE
// ============================================================================

type Comparator = Rc<dyn Fn(&Observation, &Observation) -> bool>;

#[derive(Clone, Default)]
pub struct ExprOptions {
    pub incorrect_msg: Option<String>,
    /// Bindings installed in both processes before evaluating.
    pub extra_env: Vec<(String, Value)>,
    /// Values bound positionally to the focus fragment's target variables.
    pub context_vals: Vec<Value>,
    /// Source run before the evaluation proper, both sides.
    pub pre_code: Option<String>,
    /// Evaluate this code instead of the fragment; `__focus__` is replaced
    /// by the fragment's own code, per side.
    pub expr_code: Option<String>,
    /// Inspect this variable after running instead of the result.
    pub name: Option<String>,
    /// Evaluate against a copied environment (the default) so the check
    /// leaves no trace in the process.
    pub no_copy: bool,
    /// Evaluate this code on the solution side instead of its fragment.
    pub override_code: Option<String>,
    /// Custom observation comparison.
    pub comparator: Option<Comparator>,
}

pub fn has_equal_value(state: &Rc<State>, opts: &ExprOptions) -> CheckResult {
    has_expr(state, EvalMode::Value, opts)
}

pub fn has_equal_output(state: &Rc<State>, opts: &ExprOptions) -> CheckResult {
    has_expr(state, EvalMode::Output, opts)
}

pub fn has_equal_error(state: &Rc<State>, opts: &ExprOptions) -> CheckResult {
    has_expr(state, EvalMode::Error, opts)
}

/// Run the focused fragment in both processes and compare observations.
pub fn has_expr(state: &Rc<State>, mode: EvalMode, opts: &ExprOptions) -> CheckResult {
    let solution = observe(state, mode, opts, true);
    let expected = check_solution_side(mode, &solution)?;

    let student = observe(state, mode, opts, false);
    let actual = check_student_side(state, mode, &student)?;

    let equal = match &opts.comparator {
        Some(comparator) => comparator(expected, actual),
        None => observations_equal(mode, expected, actual),
    };
    if equal {
        return Ok(Rc::clone(state));
    }

    Err(state.report(mismatch_message(
        mode,
        opts,
        &solution.repr,
        &student.repr,
    )))
}

fn observe(state: &Rc<State>, mode: EvalMode, opts: &ExprOptions, solution: bool) -> Evaluated {
    let (fragment, process, context, env): (&Fragment, _, _, _) = if solution {
        (
            &state.solution,
            &state.solution_process,
            &state.solution_context,
            &state.solution_env,
        )
    } else {
        (
            &state.student,
            &state.student_process,
            &state.student_context,
            &state.student_env,
        )
    };

    let source = if solution && opts.override_code.is_some() {
        EvalSource::Code(opts.override_code.clone().unwrap_or_default())
    } else {
        match &opts.expr_code {
            Some(code) => EvalSource::Code(code.replace(FOCUS_PLACEHOLDER, &fragment.code)),
            None => EvalSource::Node(fragment.node.clone()),
        }
    };

    let mut bindings = context.known_values();
    bindings.extend(env.known_values());
    bindings.extend(opts.extra_env.iter().cloned());
    for (name, value) in fragment.target_vars.iter().zip(opts.context_vals.iter()) {
        bindings.push((name.clone(), value.clone()));
    }

    let request = EvalRequest {
        source,
        pre_code: opts.pre_code.clone(),
        bindings,
        name: opts.name.clone(),
        copy: !opts.no_copy,
        mode,
    };
    process.borrow_mut().evaluate(&request)
}

/// The solution side must observe cleanly: in error mode it must raise, in
/// the other modes it must not. Anything else is an exercise defect.
fn check_solution_side(mode: EvalMode, solution: &Evaluated) -> Result<&Observation, Failure> {
    let authoring = |message: String| Failure::Authoring(AuthoringError::new(message));
    match (mode, &solution.observation) {
        (EvalMode::Error, Observation::Error { .. }) => Ok(&solution.observation),
        (EvalMode::Error, _) => Err(authoring(
            "`has_equal_error` expects the solution to raise an error, but it ran without one"
                .to_string(),
        )),
        (_, Observation::Error { message, .. }) => Err(authoring(format!(
            "running the solution code raised an error: `{}`",
            message
        ))),
        (_, Observation::UndefinedName(name)) => Err(authoring(format!(
            "the solution references `{}`, which is not defined",
            name
        ))),
        (_, Observation::Unrepresentable(what)) => Err(authoring(format!(
            "the solution result is {}, which cannot be compared; check something else",
            what
        ))),
        (_, observation) => Ok(observation),
    }
}

/// Student-side misbehavior becomes targeted feedback rather than a generic
/// mismatch.
fn check_student_side<'a>(
    state: &Rc<State>,
    mode: EvalMode,
    student: &'a Evaluated,
) -> Result<&'a Observation, Failure> {
    match (mode, &student.observation) {
        (EvalMode::Error, _) => Ok(&student.observation),
        (_, Observation::Error { message, .. }) => Err(state.report(
            FeedbackComponent::new("Running it generated an error: `{{message}}`.")
                .with("message", message),
        )),
        (_, Observation::UndefinedName(name)) => Err(state.report(
            FeedbackComponent::new("Have you defined `{{name}}` without errors?")
                .with("name", name),
        )),
        (_, observation) => Ok(observation),
    }
}

fn observations_equal(mode: EvalMode, expected: &Observation, actual: &Observation) -> bool {
    match (mode, expected, actual) {
        (EvalMode::Output, Observation::Output(a), Observation::Output(b)) => {
            a.trim() == b.trim()
        }
        (EvalMode::Error, Observation::Error { message: a, .. }, Observation::Error { message: b, .. }) => {
            a == b
        }
        (EvalMode::Error, _, _) => false,
        _ => expected == actual,
    }
}

fn mismatch_message(
    mode: EvalMode,
    opts: &ExprOptions,
    sol_repr: &Option<String>,
    stu_repr: &Option<String>,
) -> FeedbackComponent {
    if let Some(template) = &opts.incorrect_msg {
        let mut component = FeedbackComponent::new(template.clone());
        if let Some(sol) = sol_repr {
            component = component.with("sol_eval", shorten(sol, REPR_LIMIT));
        }
        if let Some(stu) = stu_repr {
            component = component.with("stu_eval", shorten(stu, REPR_LIMIT));
        }
        return component;
    }

    // Representations are only shown when both exist, fit on one line, and
    // actually differ as text.
    let showable = match (sol_repr, stu_repr) {
        (Some(sol), Some(stu)) => {
            !sol.contains('\n') && !stu.contains('\n') && sol.len() <= REPR_LIMIT && sol != stu
        }
        _ => false,
    };

    if !showable {
        return FeedbackComponent::new("Expected something different.");
    }
    let (sol, stu) = (
        sol_repr.clone().unwrap_or_default(),
        stu_repr.clone().unwrap_or_default(),
    );

    let template = match (&opts.name, mode) {
        (Some(_), _) => {
            "Are you sure you assigned the correct value to `{{name}}`? \
             Expected `{{sol_eval}}`, but got `{{stu_eval}}`."
        }
        (None, EvalMode::Value) => "Expected `{{sol_eval}}`, but got `{{stu_eval}}`.",
        (None, EvalMode::Output) => "Expected the output `{{sol_eval}}`, but got `{{stu_eval}}`.",
        (None, EvalMode::Error) => "Expected the error `{{sol_eval}}`, but got `{{stu_eval}}`.",
    };
    let mut component = FeedbackComponent::new(template)
        .with("sol_eval", sol)
        .with("stu_eval", shorten(&stu, REPR_LIMIT));
    if let Some(name) = &opts.name {
        component = component.with("name", name);
    }
    component
}

// ============================================================================
// TEXT AND OUTPUT CHECKS
// ============================================================================

/// Look for a pattern in the focused student code. Student-only: the
/// solution is never consulted.
pub fn has_code(
    state: &Rc<State>,
    pattern: &str,
    fixed: bool,
    incorrect_msg: Option<&str>,
) -> CheckResult {
    let found = if fixed {
        state.student.code.contains(pattern)
    } else {
        compile_pattern(pattern)?.is_match(&state.student.code)
    };
    if found {
        return Ok(Rc::clone(state));
    }
    let template =
        incorrect_msg.unwrap_or("The checker could not find `{{pattern}}` in your code.");
    Err(state.report(FeedbackComponent::new(template).with("pattern", pattern)))
}

/// Look for a pattern in everything the student program printed.
pub fn has_output(
    state: &Rc<State>,
    pattern: &str,
    fixed: bool,
    incorrect_msg: Option<&str>,
) -> CheckResult {
    let output = state.student_process.borrow().output().to_string();
    let found = if fixed {
        output.contains(pattern)
    } else {
        compile_pattern(pattern)?.is_match(&output)
    };
    if found {
        return Ok(Rc::clone(state));
    }
    let template = incorrect_msg.unwrap_or("Did you print the expected output?");
    Err(state.report(FeedbackComponent::new(template).with("pattern", pattern)))
}

/// Fail if running the student program raised an error. Root-only.
pub fn has_no_error(state: &Rc<State>, incorrect_msg: Option<&str>) -> CheckResult {
    state.assert_execution_root("has_no_error")?;
    let Some(error) = &state.student_run_error else {
        return Ok(Rc::clone(state));
    };
    let template =
        incorrect_msg.unwrap_or("Your code contains an error: `{{message}}`. Fix it and try again!");
    Err(state.report(FeedbackComponent::new(template).with("message", error.to_string())))
}

/// Re-run the nth `print` call of the solution and look for its output in
/// the student output. Root-only.
pub fn has_printout(state: &Rc<State>, index: usize, incorrect_msg: Option<&str>) -> CheckResult {
    state.assert_execution_root("has_printout")?;

    let call = state
        .solution_index
        .calls("print")
        .get(index)
        .cloned()
        .ok_or_else(|| {
            Failure::Authoring(AuthoringError::new(format!(
                "`has_printout({})` could not find that many `print` calls in the solution",
                index
            )))
        })?;

    let request = EvalRequest::node(call.node.clone(), EvalMode::Output);
    let expected = state.solution_process.borrow_mut().evaluate(&request);
    let expected_text = match expected.observation {
        Observation::Output(text) => text.trim().to_string(),
        _ => {
            return Err(Failure::Authoring(AuthoringError::new(format!(
                "re-running `{}` from the solution raised an error",
                call.code
            ))))
        }
    };

    let student_output = state.student_process.borrow().output().to_string();
    if student_output.contains(&expected_text) {
        return Ok(Rc::clone(state));
    }
    let template = incorrect_msg
        .unwrap_or("Have you used `{{call}}` to do the appropriate printouts?");
    Err(state.report(FeedbackComponent::new(template).with("call", &call.code)))
}

/// Check that the student brought a module in scope, optionally under the
/// same alias the solution uses.
pub fn has_import(
    state: &Rc<State>,
    module: &str,
    same_as: bool,
    not_imported_msg: Option<&str>,
    incorrect_as_msg: Option<&str>,
) -> CheckResult {
    let student_alias = alias_for(&state.student_index.aliases, module);
    let solution_alias = alias_for(&state.solution_index.aliases, module);

    if solution_alias.is_none() {
        return Err(Failure::Authoring(AuthoringError::new(format!(
            "`has_import` checks `{}`, but the solution does not use it",
            module
        ))));
    }

    let Some(student_alias) = student_alias else {
        let template = not_imported_msg.unwrap_or("Did you bring `{{module}}` into scope?");
        return Err(state.report(FeedbackComponent::new(template).with("module", module)));
    };

    if same_as && solution_alias.as_deref() != Some(student_alias.as_str()) {
        let template = incorrect_as_msg.unwrap_or("Did you use the alias `{{alias}}`?");
        return Err(state.report(
            FeedbackComponent::new(template)
                .with("alias", solution_alias.unwrap_or_default())
                .with("module", module),
        ));
    }
    Ok(Rc::clone(state))
}

fn alias_for(aliases: &im::OrdMap<String, String>, module: &str) -> Option<String> {
    aliases
        .iter()
        .find(|(_, m)| m.as_str() == module)
        .map(|(a, _)| a.clone())
}

fn compile_pattern(pattern: &str) -> Result<Regex, Failure> {
    Regex::new(pattern).map_err(|e| {
        Failure::Authoring(AuthoringError::new(format!(
            "invalid pattern `{}`: {}",
            pattern, e
        )))
    })
}
