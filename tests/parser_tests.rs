use rubric::syntax::parser::wrap_in_program;
use rubric::syntax::{ast_dump, parse, Expr, ParseErrorKind};

#[test]
fn parses_atoms() {
    let nodes = parse("42 -3.5 true false \"hi\" :key name").unwrap();
    assert_eq!(nodes.len(), 7);
    assert!(matches!(&*nodes[0].value, Expr::Number(n) if *n == 42.0));
    assert!(matches!(&*nodes[1].value, Expr::Number(n) if *n == -3.5));
    assert!(matches!(&*nodes[2].value, Expr::Bool(true)));
    assert!(matches!(&*nodes[3].value, Expr::Bool(false)));
    assert!(matches!(&*nodes[4].value, Expr::Str(s) if s == "hi"));
    assert!(matches!(&*nodes[5].value, Expr::Keyword(k) if k == "key"));
    assert!(matches!(&*nodes[6].value, Expr::Symbol(s) if s == "name"));
}

#[test]
fn parses_nested_lists_with_spans() {
    let source = "(set x (+ 1 2))";
    let nodes = parse(source).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].span.start, 0);
    assert_eq!(nodes[0].span.end, source.len());

    let Expr::List(items) = &*nodes[0].value else {
        panic!("expected a list");
    };
    assert_eq!(items.len(), 3);
    assert_eq!(&source[items[2].span.start..items[2].span.end], "(+ 1 2)");
}

#[test]
fn parses_qualified_symbols_and_operators() {
    let nodes = parse("(math.floor 1.5) (<= 1 2)").unwrap();
    let Expr::List(items) = &*nodes[0].value else {
        panic!("expected a list");
    };
    assert!(matches!(&*items[0].value, Expr::Symbol(s) if s == "math.floor"));
    let Expr::List(items) = &*nodes[1].value else {
        panic!("expected a list");
    };
    assert!(matches!(&*items[0].value, Expr::Symbol(s) if s == "<="));
}

#[test]
fn empty_input_is_fine() {
    assert!(parse("").unwrap().is_empty());
    assert!(parse("  ; only a comment\n").unwrap().is_empty());
}

#[test]
fn comments_are_skipped() {
    let nodes = parse("; header\n(print 1) ; trailing\n").unwrap();
    assert_eq!(nodes.len(), 1);
}

#[test]
fn missing_close_paren_is_an_unbalanced_delimiter() {
    let err = parse("(print (+ 1 2)").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnbalancedDelimiter);
    assert!(err.message.contains("missing `)`"));
}

#[test]
fn stray_close_paren_is_an_unbalanced_delimiter() {
    let err = parse("(print 1))").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnbalancedDelimiter);
    assert!(err.message.contains("unexpected `)`"));
}

#[test]
fn parens_inside_strings_and_comments_do_not_count() {
    assert!(parse("(print \"(((\") ; )))\n").is_ok());
}

#[test]
fn string_escapes() {
    let nodes = parse(r#""a\nb\t\"c\"""#).unwrap();
    assert!(matches!(&*nodes[0].value, Expr::Str(s) if s == "a\nb\t\"c\""));
}

#[test]
fn invalid_escape_is_a_syntax_error() {
    let err = parse(r#""bad \q escape""#).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
}

#[test]
fn wrap_in_program_only_when_needed() {
    let one = parse("(print 1)").unwrap();
    let wrapped = wrap_in_program(one);
    assert!(!wrapped.is_program_wrapper());

    let two = parse("(print 1) (print 2)").unwrap();
    let wrapped = wrap_in_program(two);
    assert!(wrapped.is_program_wrapper());
    assert_eq!(wrapped.statements().len(), 2);
}

#[test]
fn ast_dump_ignores_formatting() {
    let a = parse("(set   x\n  (+ 1   2))").unwrap();
    let b = parse("(set x (+ 1 2))").unwrap();
    assert_eq!(
        ast_dump(&wrap_in_program(a)),
        ast_dump(&wrap_in_program(b))
    );
}

#[test]
fn ast_dump_strips_single_statement_wrapper() {
    let bare = parse("(print 1)").unwrap();
    let wrapped = wrap_in_program(parse("(print 1)").unwrap());
    assert_eq!(ast_dump(&bare[0]), ast_dump(&wrapped));
}

#[test]
fn ast_dump_formats_whole_numbers_without_fraction() {
    let nodes = parse("(+ 1.0 2.5)").unwrap();
    assert_eq!(ast_dump(&nodes[0]), "(+ 1 2.5)");
}
