use std::rc::Rc;

use rubric::check::{function, has, parts, State};
use rubric::failure::Failure;
use rubric::runtime::ParamSig;
use rubric::session::{Exercise, Session};
use rubric::syntax::{NodeKind, PartIndex};

fn session(solution: &str, student: &str) -> Session {
    let exercise = Exercise {
        pre_exercise_code: String::new(),
        solution_code: solution.to_string(),
        sct: vec![],
    };
    Session::new(&exercise, student).expect("session builds")
}

fn grading_message(failure: Failure) -> String {
    match failure {
        Failure::Grading(f) => f.message,
        Failure::Authoring(e) => panic!("expected a grading failure, got: {}", e),
    }
}

fn call(state: &Rc<State>, name: &str, index: usize) -> Result<Rc<State>, Failure> {
    function::check_function(state, name, index, None, None, None, None)
}

// ============================================================================
// LOCATING CALLS
// ============================================================================

#[test]
fn finds_calls_through_different_aliases() {
    let session = session(
        "(use math :as m) (print (m.floor 1.7))",
        "(use math :as mm) (print (mm.floor 1.7))",
    );
    let call_state = call(session.root(), "math.floor", 0).unwrap();
    assert_eq!(call_state.node_kind, NodeKind::FunctionCall);
    assert_eq!(call_state.student.code, "(mm.floor 1.7)");
    assert_eq!(call_state.solution.code, "(m.floor 1.7)");
}

#[test]
fn missing_call_uses_the_student_wording_for_the_name() {
    let session = session(
        "(use math :as m) (print (m.floor 1.7))",
        "(use math :as mm) (print 1)",
    );
    let failure = call(session.root(), "math.floor", 0).unwrap_err();
    assert_eq!(grading_message(failure), "Did you call `mm.floor`?");
}

#[test]
fn missing_repeated_call_counts_in_words() {
    let session = session("(print 1) (print 2)", "(print 1)");
    let failure = call(session.root(), "print", 1).unwrap_err();
    assert_eq!(
        grading_message(failure),
        "Did you call `print` at least twice?"
    );
}

#[test]
fn call_missing_from_the_solution_is_an_authoring_error() {
    let session = session("(print 1)", "(len (list 1))");
    assert!(matches!(
        call(session.root(), "len", 0),
        Err(Failure::Authoring(_))
    ));
}

// ============================================================================
// ARGUMENT BINDING
// ============================================================================

#[test]
fn bound_arguments_are_addressable_by_name_and_position() {
    let session = session(
        "(def scale (x factor) (* x factor)) (scale 2 :factor 10)",
        "(def scale (x factor) (* x factor)) (scale :factor 10 :x 2)",
    );
    let call_state = call(session.root(), "scale", 0).unwrap();

    // By name: both sides pass factor 10, however they spelled the call.
    let by_name =
        function::check_args(&call_state, &PartIndex::Key("factor".to_string()), None).unwrap();
    assert!(has::has_equal_ast(&by_name, &has::AstOptions::default()).is_ok());

    // By position: slot 0 is `x` in signature order on both sides.
    let by_pos = function::check_args(&call_state, &PartIndex::Pos(0), None).unwrap();
    assert_eq!(by_pos.student.code, "2");
    assert_eq!(by_pos.solution.code, "2");
}

#[test]
fn bound_arguments_compare_by_value() {
    let session = session(
        "(def scale (x factor) (* x factor)) (scale 2 :factor 10)",
        "(def scale (x factor) (* x factor)) (scale 2 :factor (+ 5 5))",
    );
    let call_state = call(session.root(), "scale", 0).unwrap();
    let arg =
        function::check_args(&call_state, &PartIndex::Key("factor".to_string()), None).unwrap();
    assert!(has::has_equal_value(&arg, &has::ExprOptions::default()).is_ok());
}

#[test]
fn missing_argument_is_grading_feedback() {
    let session = session(
        "(def greet ((name \"you\")) name) (greet \"ann\")",
        "(def greet ((name \"you\")) name) (greet)",
    );
    let call_state = call(session.root(), "greet", 0).unwrap();
    let failure =
        function::check_args(&call_state, &PartIndex::Key("name".to_string()), None).unwrap_err();
    let message = grading_message(failure);
    assert!(
        message.contains("Did you specify the argument `name`?"),
        "got: {}",
        message
    );
}

#[test]
fn student_call_that_does_not_fit_the_signature() {
    let session = session(
        "(def scale (x factor) (* x factor)) (scale 2 10)",
        "(def scale (x factor) (* x factor)) (scale 2 :wrong 10)",
    );
    let failure = call(session.root(), "scale", 0).unwrap_err();
    let message = grading_message(failure);
    assert!(
        message.contains("Something went wrong in figuring out how you specified the arguments"),
        "got: {}",
        message
    );
    assert!(message.contains("`scale`"), "got: {}", message);
}

#[test]
fn solution_call_that_does_not_fit_an_explicit_signature() {
    let session = session(
        "(def scale (x factor) (* x factor)) (scale 2 10)",
        "(def scale (x factor) (* x factor)) (scale 2 10)",
    );
    let narrow = ParamSig {
        required: vec!["x".to_string()],
        optional: vec![],
        rest: None,
    };
    let result = function::check_function(
        session.root(),
        "scale",
        0,
        None,
        None,
        None,
        Some(narrow),
    );
    assert!(matches!(result, Err(Failure::Authoring(_))));
}

#[test]
fn signatures_are_introspected_through_set_bindings() {
    let session = session(
        "(set f (lambda (x) x)) (f :x 7)",
        "(set f (lambda (x) x)) (f 7)",
    );
    let call_state = call(session.root(), "f", 0).unwrap();
    let arg =
        function::check_args(&call_state, &PartIndex::Key("x".to_string()), None).unwrap();
    assert_eq!(arg.student.code, "7");
    assert_eq!(arg.solution.code, "7");
}

#[test]
fn unknown_callable_keeps_arguments_as_written() {
    // A call that never runs has no runtime binding to introspect, so the
    // arguments stay addressable as written.
    let session = session("(if false (g 7))", "(if false (g 7))");
    let call_state = call(session.root(), "g", 0).unwrap();
    let arg = function::check_args(&call_state, &PartIndex::Pos(0), None).unwrap();
    assert_eq!(arg.student.code, "7");
}

// ============================================================================
// RE-CALLING DEFINITIONS
// ============================================================================

#[test]
fn check_call_reruns_a_function_definition() {
    let session = session(
        "(def double (x) (* x 2))",
        "(def double (x) (+ x x))",
    );
    let def = parts::check_node(
        session.root(),
        NodeKind::FunctionDef,
        &PartIndex::Key("double".to_string()),
        None,
        None,
        None,
    )
    .unwrap();
    let recall = function::check_call(&def, "(f 4)", None).unwrap();
    assert!(has::has_equal_value(&recall, &has::ExprOptions::default()).is_ok());
}

#[test]
fn check_call_surfaces_behavioral_differences() {
    let session = session(
        "(def double (x) (* x 2))",
        "(def double (x) (+ x 3))",
    );
    let def = parts::check_node(
        session.root(),
        NodeKind::FunctionDef,
        &PartIndex::Key("double".to_string()),
        None,
        None,
        None,
    )
    .unwrap();
    let recall = function::check_call(&def, "(f 4)", None).unwrap();
    let failure = has::has_equal_value(&recall, &has::ExprOptions::default()).unwrap_err();
    let message = grading_message(failure);
    assert!(
        message.contains("Expected `8`, but got `7`."),
        "got: {}",
        message
    );
    assert!(
        message.contains("To verify it, we reran `(f 4)`."),
        "got: {}",
        message
    );
}

#[test]
fn check_call_works_on_lambdas() {
    let session = session(
        "(set twice (lambda (x) (* x 2)))",
        "(set twice (lambda (x) (* x 2)))",
    );
    let lambda = parts::check_node(
        session.root(),
        NodeKind::Lambda,
        &PartIndex::Pos(0),
        None,
        None,
        None,
    )
    .unwrap();
    let recall = function::check_call(&lambda, "(f 21)", None).unwrap();
    assert!(has::has_equal_value(&recall, &has::ExprOptions::default()).is_ok());
}

#[test]
fn check_call_requires_a_definition_in_focus() {
    let session = session("(print 1)", "(print 1)");
    assert!(matches!(
        function::check_call(session.root(), "(f 1)", None),
        Err(Failure::Authoring(_))
    ));
}

#[test]
fn check_call_rejects_a_malformed_callstr() {
    let session = session(
        "(def double (x) (* x 2))",
        "(def double (x) (* x 2))",
    );
    let def = parts::check_node(
        session.root(),
        NodeKind::FunctionDef,
        &PartIndex::Key("double".to_string()),
        None,
        None,
        None,
    )
    .unwrap();
    assert!(matches!(
        function::check_call(&def, "(g 1)", None),
        Err(Failure::Authoring(_))
    ));
}
