use rubric::sct::CheckSpec;
use rubric::session::{grade_submission, Exercise, Grade};
use serde_json::json;

fn exercise(value: serde_json::Value) -> Exercise {
    serde_json::from_value(value).expect("exercise deserializes")
}

fn grade(exercise: &Exercise, student: &str) -> Grade {
    grade_submission(exercise, student).expect("no authoring error")
}

// ============================================================================
// SPEC (DE)SERIALIZATION
// ============================================================================

#[test]
fn specs_deserialize_from_tagged_json() {
    let specs: Vec<CheckSpec> = serde_json::from_value(json!([
        {"check": "check_for_loop", "then": [
            {"check": "has_context"},
            {"check": "check_part", "name": "body", "then": [
                {"check": "has_equal_output", "context_vals": [2]}
            ]}
        ]},
        {"check": "has_equal_ast", "exact": false},
        {"check": "check_function", "name": "math.floor", "index": 1},
        {"check": "set_context", "vals": [3], "then": [{"check": "has_equal_output"}]},
        {"check": "has_equal_name"},
        {"check": "fail"}
    ]))
    .expect("specs deserialize");

    assert_eq!(specs.len(), 6);
    assert!(matches!(&specs[0], CheckSpec::CheckForLoop(node) if node.then.len() == 2));
    assert!(matches!(&specs[1], CheckSpec::HasEqualAst { exact: false, .. }));
    assert!(matches!(&specs[2], CheckSpec::CheckFunction { index: 1, .. }));
    assert!(matches!(&specs[3], CheckSpec::SetContext { then, .. } if then.len() == 1));
    assert!(matches!(&specs[4], CheckSpec::HasEqualName { incorrect_msg: None }));
    assert!(matches!(&specs[5], CheckSpec::Fail { msg: None }));
}

#[test]
fn exact_defaults_to_true_and_override_is_renamed() {
    let spec: CheckSpec =
        serde_json::from_value(json!({"check": "has_equal_ast"})).expect("spec deserializes");
    assert!(matches!(spec, CheckSpec::HasEqualAst { exact: true, .. }));

    let spec: CheckSpec = serde_json::from_value(
        json!({"check": "has_equal_value", "override": "(+ 1 1)"}),
    )
    .expect("spec deserializes");
    let CheckSpec::HasEqualValue(expr) = spec else {
        panic!("expected has_equal_value");
    };
    assert_eq!(expr.override_code.as_deref(), Some("(+ 1 1)"));
}

#[test]
fn grades_serialize_for_the_json_output_mode() {
    let grade = Grade {
        correct: false,
        message: "Nope.".to_string(),
        highlight: None,
    };
    let rendered = serde_json::to_value(&grade).expect("grade serializes");
    assert_eq!(rendered["correct"], json!(false));
    assert_eq!(rendered["message"], json!("Nope."));
}

// ============================================================================
// END-TO-END GRADING
// ============================================================================

fn loop_exercise() -> Exercise {
    exercise(json!({
        "solution_code": "(for n (range 1 4) (print (* n 2)))",
        "sct": [
            {"check": "check_for_loop", "then": [
                {"check": "has_context"},
                {"check": "check_part", "name": "body", "then": [
                    {"check": "has_equal_output", "context_vals": [2]}
                ]}
            ]}
        ]
    }))
}

#[test]
fn correct_submission_with_renamed_loop_variable() {
    let grade = grade(&loop_exercise(), "(for m (range 1 4) (print (* m 2)))");
    assert!(grade.correct);
    assert_eq!(grade.message, "Great work!");
    assert!(grade.highlight.is_none());
}

#[test]
fn wrong_loop_body_gets_the_accumulated_chain() {
    let student = "(for j (range 1 4) (print (* j 3)))";
    let grade = grade(&loop_exercise(), student);
    assert!(!grade.correct);
    assert_eq!(
        grade.message,
        "Check the 1st for loop. Did you check the body? Expected the output `4`, but got `6`."
    );
    let span = grade.highlight.expect("narrowed failure highlights");
    assert_eq!(&student[span.start..span.end], "(print (* j 3))");
}

#[test]
fn missing_loop_is_reported_without_a_highlight_fuss() {
    let grade = grade(&loop_exercise(), "(print 2)");
    assert!(!grade.correct);
    assert_eq!(
        grade.message,
        "The checker wanted to look at the 1st for loop, but your submission does not contain it."
    );
}

#[test]
fn import_alias_checking() {
    let exercise = exercise(json!({
        "solution_code": "(use math :as m) (print (m.sqrt 4))",
        "sct": [
            {"check": "has_import", "module": "math", "same_as": true},
            {"check": "check_function", "name": "math.sqrt", "then": [
                {"check": "check_args", "name": "x", "then": [
                    {"check": "has_equal_value"}
                ]}
            ]}
        ]
    }));

    let ok = grade(&exercise, "(use math :as m) (print (m.sqrt (+ 2 2)))");
    assert!(ok.correct, "got: {}", ok.message);

    let wrong_alias = grade(&exercise, "(use math) (print (math.sqrt 4))");
    assert!(!wrong_alias.correct);
    assert_eq!(wrong_alias.message, "Did you use the alias `m`?");

    let not_imported = grade(&exercise, "(print 2)");
    assert!(!not_imported.correct);
    assert_eq!(not_imported.message, "Did you bring `math` into scope?");
}

#[test]
fn printed_output_checks() {
    let exercise = exercise(json!({
        "solution_code": "(print \"hello\") (print (+ 1 1))",
        "sct": [
            {"check": "has_output", "pattern": "hello", "fixed": true},
            {"check": "has_printout", "index": 1}
        ]
    }));

    let ok = grade(&exercise, "(print \"hello there\") (print 2)");
    assert!(ok.correct, "got: {}", ok.message);

    let missing_printout = grade(&exercise, "(print \"hello\")");
    assert!(!missing_printout.correct);
    assert_eq!(
        missing_printout.message,
        "Have you used `(print (+ 1 1))` to do the appropriate printouts?"
    );
}

#[test]
fn runtime_errors_fail_the_submission_even_when_checks_pass() {
    let exercise = exercise(json!({
        "solution_code": "(print 1)",
        "sct": []
    }));
    let grade = grade(&exercise, "(print 1) (/ 1 0)");
    assert!(!grade.correct);
    assert_eq!(
        grade.message,
        "Your code contains an error: `division by zero`. Fix it and try again!"
    );
}

#[test]
fn has_no_error_reports_the_runtime_error() {
    let exercise = exercise(json!({
        "solution_code": "(print 1)",
        "sct": [{"check": "has_no_error"}]
    }));
    let grade = grade(&exercise, "(print missing)");
    assert!(!grade.correct);
    assert_eq!(
        grade.message,
        "Your code contains an error: `name `missing` is not defined`. Fix it and try again!"
    );
}

#[test]
fn student_parse_errors_grade_as_incorrect() {
    let exercise = exercise(json!({
        "solution_code": "(print 1)",
        "sct": []
    }));
    let grade = grade(&exercise, "(print 1");
    assert!(!grade.correct);
    assert!(
        grade.message.contains("unbalanced parentheses"),
        "got: {}",
        grade.message
    );
    assert!(grade.highlight.is_some());
}

#[test]
fn authoring_mistakes_never_reach_the_student() {
    let exercise = exercise(json!({
        "solution_code": "(print 1)",
        "sct": [{"check": "check_function", "name": "len"}]
    }));
    let error = grade_submission(&exercise, "(len (list 1))").unwrap_err();
    assert!(
        error.message.starts_with("SCT fails on solution:"),
        "got: {}",
        error.message
    );
}

#[test]
fn extra_env_bindings_from_json() {
    let exercise = exercise(json!({
        "solution_code": "(print 1)",
        "sct": [
            {"check": "has_equal_value", "expr_code": "(+ bonus 1)",
             "extra_env": [["bonus", 10]]}
        ]
    }));
    let grade = grade(&exercise, "(print 1)");
    assert!(grade.correct, "got: {}", grade.message);
}

#[test]
fn pre_exercise_code_seeds_both_sides() {
    let exercise = exercise(json!({
        "pre_exercise_code": "(use math :as m) (set base 10)",
        "solution_code": "(print (m.floor (+ base 1.5)))",
        "sct": [
            {"check": "check_function", "name": "math.floor", "then": [
                {"check": "has_equal_value"}
            ]}
        ]
    }));
    let grade = grade(&exercise, "(print (m.floor (+ base 1.5)))");
    assert!(grade.correct, "got: {}", grade.message);
}

#[test]
fn set_context_specs_fix_the_loop_variable() {
    let exercise = exercise(json!({
        "solution_code": "(for n (range 1 4) (print (* n 2)))",
        "sct": [
            {"check": "check_for_loop", "then": [
                {"check": "check_part", "name": "body", "then": [
                    {"check": "set_context", "vals": [3], "then": [
                        {"check": "has_equal_output"}
                    ]}
                ]}
            ]}
        ]
    }));

    let ok = grade(&exercise, "(for m (range 1 4) (print (* m 2)))");
    assert!(ok.correct, "got: {}", ok.message);

    let wrong = grade(&exercise, "(for m (range 1 4) (print (* m 4)))");
    assert!(!wrong.correct);
    assert!(
        wrong.message.contains("Expected the output `6`, but got `12`."),
        "got: {}",
        wrong.message
    );
}

#[test]
fn set_env_specs_seed_both_processes() {
    let exercise = exercise(json!({
        "solution_code": "(print 1)",
        "sct": [
            {"check": "set_env", "names": [["bonus", 10]], "then": [
                {"check": "has_equal_value", "expr_code": "(+ bonus 1)"}
            ]}
        ]
    }));
    let grade = grade(&exercise, "(print 1)");
    assert!(grade.correct, "got: {}", grade.message);
}

#[test]
fn part_comparison_specs_inspect_definition_parameters() {
    let exercise = exercise(json!({
        "solution_code": "(def scale (x (factor 2)) (* x factor))",
        "sct": [
            {"check": "check_function_def", "name": "scale", "then": [
                {"check": "has_equal_part_len", "name": "args"},
                {"check": "check_part_index", "name": "args", "index": "factor", "then": [
                    {"check": "is_default"}
                ]}
            ]}
        ]
    }));

    let ok = grade(&exercise, "(def scale (x (factor 3)) (* x factor))");
    assert!(ok.correct, "got: {}", ok.message);

    let explicit = grade(&exercise, "(def scale (x factor) (* x factor))");
    assert!(!explicit.correct);
    assert!(
        explicit.message.contains("Have you used the default value here?"),
        "got: {}",
        explicit.message
    );

    let fewer = grade(&exercise, "(def scale (x) x)");
    assert!(!fewer.correct);
    assert!(
        fewer.message.contains("Expected 2, but got 1."),
        "got: {}",
        fewer.message
    );
}

#[test]
fn with_context_specs_grade_inside_the_scope() {
    let exercise = exercise(json!({
        "solution_code": "(with ((a (resource 3))) (print (* a 2)))",
        "sct": [
            {"check": "check_with", "then": [
                {"check": "with_context", "then": [
                    {"check": "check_part", "name": "body", "then": [
                        {"check": "has_equal_output"}
                    ]}
                ]}
            ]}
        ]
    }));

    let ok = grade(&exercise, "(with ((a (resource 3))) (print (* a 2)))");
    assert!(ok.correct, "got: {}", ok.message);

    let wrong = grade(&exercise, "(with ((a (resource 3))) (print (* a 5)))");
    assert!(!wrong.correct);
    assert!(wrong.message.contains("Expected the output `6`, but got `15`."), "got: {}", wrong.message);
}
