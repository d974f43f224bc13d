//! Whole programs run through a session.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use hbl_exec::globals::LAST_EXECUTION_ERROR;
use hbl_exec::{buffer_handler, silent_handler, LoopbackTransport, Session, SharedPrintHandler};
use hbl_formula::{Dict, Value};
use hbl_ir::ErrorMode;

fn session() -> Session {
    Session::builder().print_handler(silent_handler()).build()
}

fn with_output() -> (Session, SharedPrintHandler) {
    let handler = buffer_handler();
    let session = Session::builder().print_handler(handler.clone()).build();
    (session, handler)
}

fn run(source: &str) -> Value {
    session().run_source(source).unwrap()
}

// ─── Control flow ───

#[test]
fn for_loop_returns_its_accumulator() {
    assert_eq!(
        run("x = 1; for (i = 0; i < 5; i += 1) { x = x * 2; } return x;"),
        Value::Number(32.0)
    );
}

#[test]
fn if_else_takes_the_false_branch() {
    assert_eq!(
        run("if (0) { return 1; } else { return 2; }"),
        Value::Number(2.0)
    );
    assert_eq!(
        run(r#"if ("") { return 1; } else { return 2; }"#),
        Value::Number(2.0)
    );
}

#[test]
fn if_without_else() {
    assert_eq!(run("y = 0; if (1) { y = 7; } return y;"), Value::Number(7.0));
    assert_eq!(run("y = 0; if (0) { y = 7; } return y;"), Value::Number(0.0));
}

#[test]
fn break_and_continue() {
    let source = "s = 0; for (i = 0; i < 10; i += 1) { if (i == 3) { continue; } if (i == 6) { break; } s = s + i; } return s;";
    assert_eq!(run(source), Value::Number(12.0));
}

#[test]
fn break_skips_the_increment() {
    assert_eq!(
        run("for (i = 0; i < 10; i += 1) { if (i == 4) { break; } } return i;"),
        Value::Number(4.0)
    );
}

#[test]
fn continue_in_while_rechecks_the_condition() {
    let source = "n = 0; s = 0; while (n < 5) { n += 1; if (n == 2) { continue; } s = s + n; } return s;";
    assert_eq!(run(source), Value::Number(13.0));
}

#[test]
fn while_and_do_while() {
    assert_eq!(run("n = 0; while (n < 4) { n += 1; } return n;"), Value::Number(4.0));
    assert_eq!(run("n = 10; do { n += 1; } while (n < 4); return n;"), Value::Number(11.0));
}

#[test]
fn redeclared_function_is_seen_by_earlier_callers() {
    let source = "function f() { return 1; } function g() { return f(); } function f() { return 2; } return g();";
    assert_eq!(run(source), Value::Number(2.0));
}

#[test]
fn namespace_block_qualifies_its_variables() {
    let mut session = session();
    session.run_source("x = 1; namespace inner { x = 2; }").unwrap();
    assert_eq!(session.variable("x"), &Value::Number(1.0));
    assert_eq!(session.variable("inner.x"), &Value::Number(2.0));
}

#[test]
fn include_builds_the_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("part.bf"), "y = x + 1;").unwrap();
    let main = dir.path().join("main.bf");
    fs::write(&main, r#"x = 4; #include "part.bf"; return y * 2;"#).unwrap();

    assert_eq!(session().run_file(&main).unwrap(), Value::Number(10.0));
}

// ─── Fast path ───

#[test]
fn compiled_run_matches_interpreted_run() {
    let source = "x = 0.5; for (i = 0; i < 200; i += 1) { if (i % 3 == 0) { continue; } x = x * 1.001 + Exp(-i / 50) - Log(i + 1) / 100; }";
    let mut slow = session();
    slow.run_source(source).unwrap();

    let mut quick = Session::builder()
        .print_handler(silent_handler())
        .compile(true)
        .build();
    quick.run_source(source).unwrap();

    assert!(quick.warnings().is_empty(), "{:?}", quick.warnings());
    let (Value::Number(a), Value::Number(b)) = (slow.variable("x"), quick.variable("x")) else {
        panic!("expected numbers");
    };
    assert_eq!(a.to_bits(), b.to_bits());
}

#[test]
fn compiled_copy_keeps_undefined_values() {
    let mut quick = Session::builder()
        .print_handler(silent_handler())
        .compile(true)
        .build();
    quick.run_source("x = 1; y = q;").unwrap();
    assert!(quick.variable("y").is_undefined());
    assert_eq!(quick.warnings().len(), 1);
}

#[test]
fn compile_falls_back_with_a_warning() {
    let (mut session, output) = {
        let handler = buffer_handler();
        let session = Session::builder()
            .print_handler(handler.clone())
            .compile(true)
            .build();
        (session, handler)
    };
    session
        .run_source(r#"x = 3; fprintf(stdout, "x=", x);"#)
        .unwrap();
    assert_eq!(output.get_output(), "x=3");
    assert_eq!(session.warnings().len(), 1);
}

// ─── Errors ───

#[test]
fn soft_errors_accumulate_and_execution_continues() {
    let mut session = Session::builder()
        .print_handler(silent_handler())
        .error_mode(ErrorMode::Soft)
        .build();
    session
        .run_source(r#"assert(0, "first"); assert(0, "second"); after = 1;"#)
        .unwrap();
    assert_eq!(session.variable(LAST_EXECUTION_ERROR), &Value::from("first\nsecond"));
    assert_eq!(session.variable("after"), &Value::Number(1.0));
}

#[test]
fn fatal_error_reaches_the_caller() {
    let err = session()
        .run_source(r#"x = 1; assert(x > 1, "x is too small"); x = 2;"#)
        .unwrap_err();
    assert_eq!(err.to_string(), "x is too small");
}

#[test]
fn error_handling_parameter_switches_to_soft() {
    let mut session = session();
    session
        .run_source(r#"SetParameter(HBL_EXECUTION_ERROR_HANDLING, 1, 0); assert(0, "kept going"); y = 2;"#)
        .unwrap();
    assert_eq!(session.variable(LAST_EXECUTION_ERROR), &Value::from("kept going"));
    assert_eq!(session.variable("y"), &Value::Number(2.0));
}

// ─── Output ───

#[test]
fn fprintf_formats_mixed_values() {
    let (mut session, output) = with_output();
    session
        .run_source(r#"fprintf(stdout, "n=", 1.5, " s=", "text", "\n");"#)
        .unwrap();
    assert_eq!(output.get_output(), "n=1.5 s=text\n");
}

// ─── Nested execution ───

#[test]
fn execute_commands_with_redirect_and_namespace() {
    let mut session = session();
    let mut input = Dict::new();
    input.insert("0".into(), Value::from("21"));
    session.set_variable("input", Value::dict(input));
    session
        .run_source(r#"ExecuteCommands("fscanf(stdin, \"Number\", v); r = v * 2;", input, "job");"#)
        .unwrap();
    assert_eq!(session.variable("job.r"), &Value::Number(42.0));
    assert!(session.variable("r").is_undefined());
}

#[test]
fn execute_commands_returns_into_the_caller() {
    assert_eq!(
        run(r#"ExecuteCommands("return 5 + 6;");"#),
        Value::Number(11.0)
    );
}

#[test]
fn function_library_loads_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lib.bf"), "function triple(x) { return 3 * x; }").unwrap();
    let main = dir.path().join("main.bf");
    fs::write(
        &main,
        r#"LoadFunctionLibrary("lib"); LoadFunctionLibrary("lib"); y = triple(4);"#,
    )
    .unwrap();

    let mut session = session();
    session.run_file(&main).unwrap();
    assert_eq!(session.variable("y"), &Value::Number(12.0));
    let warnings = session.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("Already loaded 'lib'"));
}

#[test]
fn choice_list_reads_redirected_input() {
    let mut session = session();
    let mut input = Dict::new();
    input.insert("0".into(), Value::from("beta"));
    session.set_variable("input", Value::dict(input));
    session
        .run_source(
            r#"ExecuteCommands("ChoiceList(c, \"Pick\", 1, SKIP_NONE, \"alpha\", \"first\", \"beta\", \"second\");", input);"#,
        )
        .unwrap();
    assert_eq!(session.variable("c"), &Value::Number(1.0));
}

// ─── Transport ───

#[test]
fn loopback_runs_remote_code() {
    let mut session = Session::builder()
        .print_handler(silent_handler())
        .transport(Box::new(LoopbackTransport::new()))
        .build();
    session
        .run_source(
            r#"MPISend(1, "function sq(x) { return x * x; } return sq(9);"); MPIReceive(1, from, reply);"#,
        )
        .unwrap();
    assert_eq!(session.variable("from"), &Value::Number(1.0));
    assert_eq!(session.variable("reply"), &Value::from("81"));
}

// ─── Profiling ───

#[test]
fn profile_counts_executed_commands() {
    let mut session = session();
    let list = Rc::new(
        session
            .build("#profile START; for (i = 0; i < 3; i += 1) { x = i; } #profile stats;", None)
            .unwrap(),
    );
    session.execute(&list).unwrap();
    let Value::Dict(stats) = session.variable("stats") else {
        panic!("stats is not a dictionary");
    };
    let Some(Value::Matrix(counts)) = stats.get("STATS") else {
        panic!("missing STATS");
    };
    assert_eq!(counts.cols(), 2);
    let hits: f64 = (0..counts.rows()).map(|r| counts.get(r, 1).unwrap()).sum();
    assert!(hits >= 10.0, "{hits}");
}
