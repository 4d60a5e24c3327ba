use std::rc::Rc;

use rubric::check::{check, context, has, parts, State};
use rubric::failure::Failure;
use rubric::runtime::Value;
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

fn focus_loop(session: &Session) -> Rc<State> {
    parts::check_node(
        session.root(),
        NodeKind::ForLoop,
        &PartIndex::Pos(0),
        None,
        None,
        None,
    )
    .unwrap()
}

fn focus_with(session: &Session) -> Rc<State> {
    parts::check_node(
        session.root(),
        NodeKind::With,
        &PartIndex::Pos(0),
        None,
        None,
        None,
    )
    .unwrap()
}

// ============================================================================
// CONTEXT VARIABLES
// ============================================================================

#[test]
fn renamed_loop_variable_passes_by_count() {
    let session = session(
        "(for n (range 1 4) (print (* n 2)))",
        "(for m (range 1 4) (print (* m 2)))",
    );
    let loop_state = focus_loop(&session);
    assert!(context::has_context(&loop_state, None, false).is_ok());
}

#[test]
fn renamed_loop_variable_fails_by_exact_name() {
    let session = session(
        "(for n (range 1 4) (print (* n 2)))",
        "(for m (range 1 4) (print (* m 2)))",
    );
    let loop_state = focus_loop(&session);
    let failure = context::has_context(&loop_state, None, true).unwrap_err();
    let message = grading_message(failure);
    assert!(message.contains("Did you use `n` instead of `m`?"), "got: {}", message);
}

#[test]
fn loop_body_still_compares_under_renamed_variables() {
    // The body fragments carry the loop targets, so narrowing into the body
    // and supplying one shared value grades both sides identically.
    let session = session(
        "(for n (range 1 4) (print (* n 2)))",
        "(for m (range 1 4) (print (* m 2)))",
    );
    let body = parts::check_part(&focus_loop(&session), "body", "body", None, None).unwrap();
    assert_eq!(body.node_kind, NodeKind::ForLoop);
    assert!(context::has_context(&body, None, false).is_ok());

    let opts = has::ExprOptions {
        context_vals: vec![rubric::runtime::Value::Number(3.0)],
        ..Default::default()
    };
    assert!(has::has_equal_output(&body, &opts).is_ok());
}

#[test]
fn unpacking_loop_targets_compare_by_count() {
    let session = session(
        "(for (k v) (list (list 1 2)) (print k))",
        "(for (a b) (list (list 1 2)) (print a))",
    );
    let loop_state = focus_loop(&session);
    assert!(context::has_context(&loop_state, None, false).is_ok());

    let failure = context::has_context(&loop_state, None, true).unwrap_err();
    let message = grading_message(failure);
    assert!(message.contains("`k, v`"), "got: {}", message);
}

#[test]
fn with_statement_contexts_are_checked_slot_by_slot() {
    let session = session(
        "(with ((a (resource 1)) (b c (resource 2 3))) (print a))",
        "(with ((a (resource 1)) (b c (resource 2 3))) (print a))",
    );
    let with_state = focus_with(&session);
    assert!(context::has_context(&with_state, None, true).is_ok());
}

#[test]
fn wrong_name_in_one_with_slot_points_at_that_slot() {
    let session = session(
        "(with ((a (resource 1)) (b c (resource 2 3))) (print a))",
        "(with ((a (resource 1)) (x y (resource 2 3))) (print a))",
    );
    let with_state = focus_with(&session);
    let failure = context::has_context(&with_state, None, true).unwrap_err();
    let message = grading_message(failure);
    assert!(message.contains("2nd context"), "got: {}", message);
    assert!(message.contains("Did you use `b, c` instead of `x, y`?"), "got: {}", message);
}

#[test]
fn missing_with_slot_is_grading_feedback() {
    let session = session(
        "(with ((a (resource 1)) (b (resource 2))) (print a))",
        "(with ((a (resource 1))) (print a))",
    );
    let with_state = focus_with(&session);
    let failure = context::has_context(&with_state, None, true).unwrap_err();
    let message = grading_message(failure);
    assert!(message.contains("2nd context"), "got: {}", message);
}

// ============================================================================
// FIXED CONTEXT AND ENVIRONMENT VALUES
// ============================================================================

#[test]
fn set_context_binds_values_under_each_sides_own_names() {
    let session = session(
        "(for n (range 1 4) (print (* n 2)))",
        "(for m (range 1 4) (print (* m 2)))",
    );
    let body = parts::check_part(&focus_loop(&session), "body", "body", None, None).unwrap();

    let fixed = context::set_context(&body, &[Value::Number(4.0)], &[]).unwrap();
    assert!(has::has_equal_output(&fixed, &has::ExprOptions::default()).is_ok());
}

#[test]
fn set_context_named_values_address_the_solution_names() {
    let session = session(
        "(for n (range 1 4) (print (* n 2)))",
        "(for m (range 1 4) (print (* m 2)))",
    );
    let body = parts::check_part(&focus_loop(&session), "body", "body", None, None).unwrap();

    let fixed =
        context::set_context(&body, &[], &[("n".to_string(), Value::Number(5.0))]).unwrap();
    assert!(has::has_equal_output(&fixed, &has::ExprOptions::default()).is_ok());
}

#[test]
fn set_context_with_an_unknown_name_is_an_authoring_error() {
    let session = session(
        "(for n (range 1 4) (print n))",
        "(for m (range 1 4) (print m))",
    );
    let body = parts::check_part(&focus_loop(&session), "body", "body", None, None).unwrap();
    assert!(matches!(
        context::set_context(&body, &[], &[("q".to_string(), Value::Number(1.0))]),
        Err(Failure::Authoring(_))
    ));
}

#[test]
fn set_context_with_surplus_values_is_an_authoring_error() {
    let session = session(
        "(for n (range 1 4) (print n))",
        "(for m (range 1 4) (print m))",
    );
    let body = parts::check_part(&focus_loop(&session), "body", "body", None, None).unwrap();
    assert!(matches!(
        context::set_context(&body, &[Value::Number(1.0), Value::Number(2.0)], &[]),
        Err(Failure::Authoring(_))
    ));
}

#[test]
fn set_env_installs_bindings_on_both_sides() {
    let session = session("(+ 1 1)", "(+ 1 1)");
    let seeded =
        context::set_env(session.root(), &[("bonus".to_string(), Value::Number(10.0))]).unwrap();

    let opts = has::ExprOptions {
        expr_code: Some("(+ bonus 2)".to_string()),
        ..Default::default()
    };
    assert!(has::has_equal_value(&seeded, &opts).is_ok());
}

#[test]
fn set_env_bindings_survive_further_narrowing() {
    let session = session(
        "(for n (range 1 4) (print n))",
        "(for m (range 1 4) (print m))",
    );
    let seeded =
        context::set_env(session.root(), &[("scale".to_string(), Value::Number(10.0))]).unwrap();
    let loop_state = parts::check_node(
        &seeded,
        NodeKind::ForLoop,
        &PartIndex::Pos(0),
        None,
        None,
        None,
    )
    .unwrap();
    let body = parts::check_part(&loop_state, "body", "body", None, None).unwrap();

    let opts = has::ExprOptions {
        expr_code: Some("(+ scale 1)".to_string()),
        ..Default::default()
    };
    assert!(has::has_equal_value(&body, &opts).is_ok());
}

// ============================================================================
// WITH SCOPING
// ============================================================================

#[test]
fn with_context_runs_checks_inside_the_entered_scope() {
    let session = session(
        "(with ((a (resource 1))) (print a))",
        "(with ((a (resource 1))) (print a))",
    );
    let with_state = focus_with(&session);

    let sees_binding = check(|state: &Rc<State>| {
        let opts = has::ExprOptions {
            expr_code: Some("(+ a 1)".to_string()),
            ..Default::default()
        };
        has::has_equal_value(state, &opts)
    });
    let result = context::with_context(&with_state, &[sees_binding]).unwrap();
    assert!(Rc::ptr_eq(&result, &with_state));
}

#[test]
fn with_context_requires_a_with_statement_in_focus() {
    let session = session("(print 1)", "(print 1)");
    assert!(matches!(
        context::with_context(session.root(), &[]),
        Err(Failure::Authoring(_))
    ));
}

#[test]
fn non_resource_binding_gets_a_protocol_message() {
    let session = session(
        "(with ((x (resource 5))) (print x))",
        "(with ((x 5)) (print x))",
    );
    let with_state = focus_with(&session);
    let failure = context::with_context(&with_state, &[]).unwrap_err();
    let message = grading_message(failure);
    assert!(
        message.contains("binds something that is not a resource (found a number)"),
        "got: {}",
        message
    );
}

#[test]
fn unpack_mismatch_gets_a_counting_message() {
    let session = session(
        "(with ((a b (resource 1 2))) (print a))",
        "(with ((a b (resource 1))) (print a))",
    );
    let with_state = focus_with(&session);
    let failure = context::with_context(&with_state, &[]).unwrap_err();
    let message = grading_message(failure);
    assert!(
        message.contains("bind 2 names but the resource yields 1 values"),
        "got: {}",
        message
    );
}

#[test]
fn student_teardown_failure_takes_precedence_over_check_failures() {
    let session = session(
        "(with ((x (resource 1))) (print x))",
        "(with ((x (broken-resource 1))) (print x))",
    );
    let with_state = focus_with(&session);
    let failing = check(|state: &Rc<State>| {
        rubric::check::logic::fail(state, Some("inner failure"))
    });
    let failure = context::with_context(&with_state, &[failing]).unwrap_err();
    let message = grading_message(failure);
    assert!(
        message.contains("could not be closed off correctly"),
        "got: {}",
        message
    );
}

#[test]
fn solution_teardown_failure_is_an_authoring_error() {
    let session = session(
        "(if false (with ((x (broken-resource 1))) (print x)))",
        "(with ((x (resource 1))) (print x))",
    );
    let with_state = focus_with(&session);
    assert!(matches!(
        context::with_context(&with_state, &[]),
        Err(Failure::Authoring(_))
    ));
}
