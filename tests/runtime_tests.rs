use rubric::runtime::{Interpreter, RuntimeError, Value};
use rubric::syntax::parse;

fn run(source: &str) -> Result<Value, RuntimeError> {
    let nodes = parse(source).expect("test source parses");
    Interpreter::new().run(&nodes)
}

fn run_output(source: &str) -> String {
    let nodes = parse(source).expect("test source parses");
    let mut interp = Interpreter::new();
    interp.run(&nodes).expect("test source runs");
    interp.output
}

#[test]
fn arithmetic_and_comparison() {
    assert_eq!(run("(+ 1 2 3)").unwrap(), Value::Number(6.0));
    assert_eq!(run("(- 10 3 2)").unwrap(), Value::Number(5.0));
    assert_eq!(run("(- 4)").unwrap(), Value::Number(-4.0));
    assert_eq!(run("(* 2 3 4)").unwrap(), Value::Number(24.0));
    assert_eq!(run("(/ 12 4)").unwrap(), Value::Number(3.0));
    assert_eq!(run("(% 7 3)").unwrap(), Value::Number(1.0));
    assert_eq!(run("(< 1 2 3)").unwrap(), Value::Bool(true));
    assert_eq!(run("(< 1 3 2)").unwrap(), Value::Bool(false));
    assert_eq!(run("(= 2 2)").unwrap(), Value::Bool(true));
    assert_eq!(run("(!= 2 2)").unwrap(), Value::Bool(false));
}

#[test]
fn string_concat_with_plus() {
    assert_eq!(
        run("(+ \"ab\" \"cd\")").unwrap(),
        Value::Str("abcd".to_string())
    );
}

#[test]
fn division_by_zero() {
    let err = run("(/ 1 0)").unwrap_err();
    assert_eq!(err, RuntimeError::DivisionByZero);
    assert_eq!(err.kind(), "zero-division");
}

#[test]
fn undefined_name() {
    let err = run("(print missing)").unwrap_err();
    assert_eq!(err, RuntimeError::UndefinedName("missing".to_string()));
    assert_eq!(err.kind(), "name-error");
}

#[test]
fn set_and_lookup() {
    assert_eq!(run("(set x 3) (+ x 1)").unwrap(), Value::Number(4.0));
}

#[test]
fn if_branches() {
    assert_eq!(run("(if (< 1 2) 10 20)").unwrap(), Value::Number(10.0));
    assert_eq!(run("(if (> 1 2) 10 20)").unwrap(), Value::Number(20.0));
    assert_eq!(run("(if false 10)").unwrap(), Value::Nil);
}

#[test]
fn function_definition_and_call() {
    assert_eq!(
        run("(def add (a b) (+ a b)) (add 2 3)").unwrap(),
        Value::Number(5.0)
    );
}

#[test]
fn keyword_arguments() {
    assert_eq!(
        run("(def sub (a b) (- a b)) (sub :b 3 :a 10)").unwrap(),
        Value::Number(7.0)
    );
}

#[test]
fn default_parameters() {
    let source = "(def greet (name (punct \"!\")) (+ name punct))";
    assert_eq!(
        run(&format!("{} (greet \"hi\")", source)).unwrap(),
        Value::Str("hi!".to_string())
    );
    assert_eq!(
        run(&format!("{} (greet \"hi\" \"?\")", source)).unwrap(),
        Value::Str("hi?".to_string())
    );
}

#[test]
fn rest_parameter_collects_surplus() {
    assert_eq!(
        run("(def count-rest (first *rest) (len rest)) (count-rest 1 2 3 4)").unwrap(),
        Value::Number(3.0)
    );
}

#[test]
fn missing_required_argument() {
    let err = run("(def add (a b) (+ a b)) (add 1)").unwrap_err();
    assert_eq!(err.kind(), "arity-error");
}

#[test]
fn recursion_works_and_is_bounded() {
    assert_eq!(
        run("(def fact (n) (if (<= n 1) 1 (* n (fact (- n 1))))) (fact 5)").unwrap(),
        Value::Number(120.0)
    );
    let err = run("(def loop (n) (loop (+ n 1))) (loop 0)").unwrap_err();
    assert_eq!(err, RuntimeError::RecursionLimit);
}

#[test]
fn lambda_values() {
    assert_eq!(
        run("(set double (lambda (x) (* x 2))) (double 21)").unwrap(),
        Value::Number(42.0)
    );
}

#[test]
fn for_loop_accumulates() {
    assert_eq!(
        run("(set total 0) (for n (range 1 4) (set total (+ total n))) total").unwrap(),
        Value::Number(6.0)
    );
}

#[test]
fn for_loop_unpacks_pairs() {
    let source = "(set out \"\")\
                  (for (k v) (list (list \"a\" 1) (list \"b\" 2)) \
                    (set out (+ out k (str v)))) out";
    assert_eq!(run(source).unwrap(), Value::Str("a1b2".to_string()));
}

#[test]
fn for_loop_unpack_arity_mismatch() {
    let err = run("(for (a b c) (list (list 1 2)) (print a))").unwrap_err();
    assert_eq!(err, RuntimeError::Unpack { want: 3, got: 2 });
}

#[test]
fn while_loop() {
    assert_eq!(
        run("(set n 0) (while (< n 5) (set n (+ n 1))) n").unwrap(),
        Value::Number(5.0)
    );
}

#[test]
fn runaway_while_loop_is_cut_off() {
    assert_eq!(run("(while true 1)").unwrap_err(), RuntimeError::IterationLimit);
}

#[test]
fn print_captures_output() {
    assert_eq!(run_output("(print 1 \"two\" 3)"), "1 two 3\n");
    assert_eq!(run_output("(print \"a\") (print \"b\")"), "a\nb\n");
}

#[test]
fn try_catch_by_kind() {
    assert_eq!(
        run("(try ((/ 1 0)) (catch zero-division \"caught\"))").unwrap(),
        Value::Str("caught".to_string())
    );
    assert_eq!(
        run("(try ((/ 1 0)) (catch error \"any\"))").unwrap(),
        Value::Str("any".to_string())
    );
    let err = run("(try ((/ 1 0)) (catch name-error \"nope\"))").unwrap_err();
    assert_eq!(err, RuntimeError::DivisionByZero);
}

#[test]
fn user_raised_errors() {
    let err = run("(error \"boom\")").unwrap_err();
    assert_eq!(err, RuntimeError::Raised("boom".to_string()));
    assert_eq!(err.kind(), "user-error");
}

#[test]
fn module_use_and_alias() {
    assert_eq!(run("(use math) (math.floor 1.7)").unwrap(), Value::Number(1.0));
    assert_eq!(
        run("(use math :as m) (m.floor 1.7)").unwrap(),
        Value::Number(1.0)
    );
    assert_eq!(
        run("(use string :as s) (s.upper \"abc\")").unwrap(),
        Value::Str("ABC".to_string())
    );
}

#[test]
fn unknown_module() {
    let err = run("(use nonsense)").unwrap_err();
    assert_eq!(err.kind(), "name-error");
}

#[test]
fn with_binds_and_runs_body() {
    assert_eq!(
        run("(with ((x (resource 7))) (+ x 1))").unwrap(),
        Value::Nil
    );
    assert_eq!(
        run("(with ((x (resource 7))) (set y (+ x 1))) y").unwrap(),
        Value::Number(8.0)
    );
}

#[test]
fn with_unpacks_multiple_values() {
    assert_eq!(
        run("(with ((a b (resource 1 2))) (set s (+ a b))) s").unwrap(),
        Value::Number(3.0)
    );
    let err = run("(with ((a b c (resource 1 2))) (print a))").unwrap_err();
    assert_eq!(err, RuntimeError::Unpack { want: 3, got: 2 });
}

#[test]
fn with_requires_a_resource() {
    let err = run("(with ((x 5)) (print x))").unwrap_err();
    assert_eq!(err, RuntimeError::Protocol("number"));
}

#[test]
fn with_teardown_failure_wins() {
    let err = run("(with ((x (broken-resource 1))) (+ x 1))").unwrap_err();
    assert_eq!(err.kind(), "user-error");
}

#[test]
fn list_builtins() {
    assert_eq!(run("(len (list 1 2 3))").unwrap(), Value::Number(3.0));
    assert_eq!(run("(nth (list 10 20 30) 1)").unwrap(), Value::Number(20.0));
    assert_eq!(run("(nth (list 10 20 30) -1)").unwrap(), Value::Number(30.0));
    assert_eq!(run("(sum (range 1 5))").unwrap(), Value::Number(10.0));
    assert_eq!(run("(len (push (list) 9))").unwrap(), Value::Number(1.0));
    let err = run("(nth (list 1) 5)").unwrap_err();
    assert_eq!(err.kind(), "index-error");
}

#[test]
fn builtins_reject_keyword_arguments() {
    let err = run("(len :x (list 1))").unwrap_err();
    assert_eq!(err.kind(), "arity-error");
}
