use super::*;
use pretty_assertions::assert_eq;

use crate::silent_handler;

fn session() -> Session {
    Session::builder().print_handler(silent_handler()).build()
}

fn number(session: &Session, name: &str) -> f64 {
    session.variable(name).as_number().unwrap()
}

// ─── Calls ───

#[test]
fn test_parameters_are_restored_after_a_call() {
    let mut session = session();
    session
        .run_source("a = 10; function twice(a) { return a * 2; } y = twice(3);")
        .unwrap();
    assert_eq!(number(&session, "y"), 6.0);
    assert_eq!(number(&session, "a"), 10.0);
}

#[test]
fn test_reference_parameters_write_back() {
    let mut session = session();
    session
        .run_source("function bump(v&) { v = v + 1; return 0; } x = 1; bump(x); bump(x);")
        .unwrap();
    assert_eq!(number(&session, "x"), 3.0);
}

#[test]
fn test_local_function_recursion() {
    let mut session = session();
    session
        .run_source("lfunction fact(n) { if (n <= 1) { return 1; } return n * fact(n - 1); } r = fact(6);")
        .unwrap();
    assert_eq!(number(&session, "r"), 720.0);
}

#[test]
fn test_local_function_variables_stay_private() {
    let mut session = session();
    session
        .run_source("t = 5; lfunction g(a) { t = a * 2; return t; } r = g(4);")
        .unwrap();
    assert_eq!(number(&session, "r"), 8.0);
    assert_eq!(number(&session, "t"), 5.0);
    let local = session.registry().get_by_name("g").unwrap();
    let namespace = local.body.namespace().unwrap().to_string();
    assert!(session
        .variables()
        .in_namespace(&namespace)
        .iter()
        .all(|id| session.variables().get(*id).is_undefined()));
}

#[test]
fn test_ordinary_function_sees_globals() {
    let mut session = session();
    session
        .run_source("scale = 3; function mul(v) { last = v * scale; return last; } r = mul(2);")
        .unwrap();
    assert_eq!(number(&session, "r"), 6.0);
    assert_eq!(number(&session, "last"), 6.0);
}

#[test]
fn test_wrong_argument_count() {
    let mut session = session();
    let message = session
        .run_source("function f(a) { return a; } y = f(1, 2);")
        .unwrap_err()
        .to_string();
    assert!(message.contains("'f' expects 1 argument(s), 2 were supplied"));
}

#[test]
fn test_call_depth_limit() {
    let mut session = Session::builder()
        .print_handler(silent_handler())
        .max_call_depth(16)
        .build();
    let message = session
        .run_source("function down(n) { return down(n + 1); } down(0);")
        .unwrap_err()
        .to_string();
    assert!(message.contains("Maximum call depth of 16 exceeded"));
    assert_eq!(session.depth, 0);
}

#[test]
fn test_redeclared_function_keeps_its_slot() {
    let mut session = session();
    session.run_source("function f(x) { return x + 1; } g = f(1);").unwrap();
    let slot = session.registry().find("f", None).unwrap();
    session.run_source("function f(x) { return x + 100; } h = f(1);").unwrap();
    assert_eq!(session.registry().find("f", None), Some(slot));
    assert_eq!(number(&session, "h"), 101.0);
    assert!(session
        .warnings()
        .iter()
        .any(|w| w.starts_with("Overwritten previously defined function")));
}

// ─── Top-level runs ───

#[test]
fn test_run_file_clears_its_functions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog.bf");
    fs::write(&path, "function h(x) { return x * 5; } return h(2);").unwrap();

    let mut session = session();
    assert_eq!(session.run_file(&path).unwrap(), Value::Number(10.0));
    assert!(session.registry().get_by_name("h").is_none());
}

#[test]
fn test_run_file_missing() {
    let mut session = session();
    let missing = Path::new("/nonexistent/hbl/prog.bf");
    assert!(matches!(
        session.run_file(missing),
        Err(RunError::ReadFile { .. })
    ));
}

#[test]
fn test_build_error_is_reported() {
    let mut session = session();
    assert!(matches!(
        session.run_source("function (x) { return x; }"),
        Err(RunError::Build(_))
    ));
}

#[test]
fn test_fatal_error_stops_the_run() {
    let mut session = session();
    let outcome = session.run_source("x = 1; m = {{1,2}}; y = m[7]; x = 2;");
    assert!(matches!(outcome, Err(RunError::Execution(ExecError::Eval(_)))));
    assert_eq!(number(&session, "x"), 1.0);
    assert!(!session.terminate);

    // The session stays usable.
    session.run_source("x = 3;").unwrap();
    assert_eq!(number(&session, "x"), 3.0);
}

#[test]
fn test_take_warnings() {
    let mut session = session();
    session.run_source("DeleteObject(nothing);").unwrap();
    assert_eq!(session.take_warnings().len(), 1);
    assert!(session.warnings().is_empty());
}

// ─── Formula caching ───

#[test]
fn test_formulas_are_memoized_unless_volatile() {
    let mut session = session();
    let list = Rc::new(session.build("x = 2; m = {{x, 1}};", None).unwrap());
    session.execute(&list).unwrap();
    assert!(list.command(0).unwrap().compiled().is_some());
    assert!(list.command(1).unwrap().compiled().is_none());

    let Value::Matrix(m) = session.variable("m") else {
        panic!("m is not a matrix");
    };
    assert_eq!(m.cells(), &[2.0, 1.0]);
}

#[test]
fn test_argument_value_prefers_objects() {
    let mut session = session();
    session
        .run_source(r#"DataSet ds = ReadDataFile("x.fas"); n = 4;"#)
        .unwrap();
    let list = InstructionList::new("", None);
    assert_eq!(session.argument_value(&list, "ds"), Value::from("ds"));
    assert_eq!(session.argument_value(&list, "n + 1"), Value::Number(5.0));
    assert_eq!(session.argument_value(&list, "(("), Value::from("(("));
}
