use super::*;
use pretty_assertions::assert_eq;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;

use hbl_formula::Matrix;

use crate::globals::{END_OF_FILE, LAST_EXECUTION_ERROR, SELECTION_STRINGS};
use crate::{buffer_handler, silent_handler, LoopbackTransport, ObjectKind, RunError, SharedPrintHandler, HBL_VERSION};

fn session() -> Session {
    Session::builder().print_handler(silent_handler()).build()
}

fn with_output() -> (Session, SharedPrintHandler) {
    let handler = buffer_handler();
    let session = Session::builder().print_handler(handler.clone()).build();
    (session, handler)
}

fn error_text(outcome: Result<Value, RunError>) -> String {
    outcome.unwrap_err().to_string()
}

/// Run `source` with `lines` queued as its standard input.
fn run_with_input(session: &mut Session, source: &str, lines: &[&str]) {
    let list = Rc::new(session.build(source, None).unwrap());
    let queue: VecDeque<String> = lines.iter().map(ToString::to_string).collect();
    list.set_input(Some(Rc::new(RefCell::new(queue))));
    session.execute(&list).unwrap();
}

// ─── Output ───

#[test]
fn test_fprintf_stdout_concatenates_arguments() {
    let (mut session, output) = with_output();
    session.run_source(r#"x = 2; fprintf(stdout, "x = ", x * 3, "\n");"#).unwrap();
    assert_eq!(output.get_output(), "x = 6\n");
}

#[test]
fn test_fprintf_list_all_variables() {
    let (mut session, output) = with_output();
    session.run_source("a = 1; b = 2; fprintf(stdout, LIST_ALL_VARIABLES);").unwrap();
    assert_eq!(output.get_output(), "{a, b}");
}

#[test]
fn test_fprintf_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    fs::write(&path, "stale").unwrap();

    let mut session = session();
    session.set_variable("OUT", Value::from(path.to_string_lossy().as_ref()));
    session
        .run_source(r#"fprintf(OUT, CLEAR_FILE, "one"); fprintf(OUT, " two");"#)
        .unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "one two");

    session
        .run_source(r#"fprintf(OUT, CLEAR_FILE, KEEP_OPEN, "a"); fprintf(OUT, "b");"#)
        .unwrap();
    assert_eq!(session.open_files.len(), 1);
    session.run_source(r#"fprintf(OUT, CLOSE_FILE, "c");"#).unwrap();
    assert!(session.open_files.is_empty());
    assert_eq!(fs::read_to_string(&path).unwrap(), "abc");
}

// ─── Input ───

#[test]
fn test_sscanf_reads_fields_in_order() {
    let mut session = session();
    session
        .run_source(r#"s = "12 hello\n3.5"; sscanf(s, "Number,String,Number", a, b, c);"#)
        .unwrap();
    assert_eq!(session.variable("a"), &Value::Number(12.0));
    assert_eq!(session.variable("b"), &Value::from("hello"));
    assert_eq!(session.variable("c"), &Value::Number(3.5));
    assert_eq!(session.variable(END_OF_FILE), &Value::Number(0.0));

    session.run_source(r#"sscanf(s, "Number", d);"#).unwrap();
    assert!(session.variable("d").is_undefined());
    assert_eq!(session.variable(END_OF_FILE), &Value::Number(1.0));

    session.run_source(r#"sscanf(s, REWIND, "Number", e);"#).unwrap();
    assert_eq!(session.variable("e"), &Value::Number(12.0));
}

#[test]
fn test_sscanf_matrix_and_lines() {
    let mut session = session();
    session
        .run_source(r#"s = "m: {{1,2}{3,4}} rest\nsecond"; sscanf(s, "Matrix,Lines", m, l);"#)
        .unwrap();
    let expected = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    assert_eq!(session.variable("m"), &Value::matrix(expected));
    let Value::Dict(lines) = session.variable("l") else {
        panic!("Lines did not produce a dictionary");
    };
    assert_eq!(lines.get("0"), Some(&Value::from(" rest")));
    assert_eq!(lines.get("1"), Some(&Value::from("second")));
}

#[test]
fn test_incomplete_scan_is_an_error() {
    let mut session = session();
    let message = error_text(session.run_source(r#"s = "7"; sscanf(s, "Number,Number", a, b);"#));
    assert!(message.contains("fscanf could not read all the parameters requested."));
    assert_eq!(session.variable("a"), &Value::Number(7.0));
    assert_eq!(session.variable(END_OF_FILE), &Value::Number(1.0));
}

#[test]
fn test_sscanf_requires_string_variable() {
    let mut session = session();
    let message = error_text(session.run_source(r#"n = 3; sscanf(n, "Number", a);"#));
    assert!(message.contains("does not refer to a string variable"));
}

#[test]
fn test_fscanf_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.txt");
    fs::write(&path, "4 5").unwrap();

    let mut session = session();
    session.set_variable("IN", Value::from(path.to_string_lossy().as_ref()));
    session
        .run_source(r#"fscanf(IN, "Number", a); fscanf(IN, "Number", b);"#)
        .unwrap();
    assert_eq!(session.variable("a"), &Value::Number(4.0));
    assert_eq!(session.variable("b"), &Value::Number(5.0));
}

#[test]
fn test_stdin_reads_from_redirect() {
    let mut session = session();
    run_with_input(&mut session, r#"fscanf(stdin, "String", x); fscanf(stdin, "Number", y);"#, &["first line", "8"]);
    assert_eq!(session.variable("x"), &Value::from("first line"));
    assert_eq!(session.variable("y"), &Value::Number(8.0));
}

#[test]
fn test_set_dialog_prompt() {
    let mut session = session();
    session.run_source(r#"SetDialogPrompt("Pick a file");"#).unwrap();
    assert_eq!(session.dialog_prompt, "Pick a file");
}

// ─── Introspection ───

#[test]
fn test_get_string_version() {
    let mut session = session();
    session
        .run_source("GetString(short, HBL_VERSION, 0); GetString(long, HBL_VERSION, 2);")
        .unwrap();
    assert_eq!(session.variable("short"), &Value::from(HBL_VERSION));
    assert_eq!(
        session.variable("long"),
        &Value::from(format!("HBL version v{HBL_VERSION}"))
    );
}

#[test]
fn test_get_string_function() {
    let mut session = session();
    session
        .run_source("function f(a, b) { return a + b; } GetString(info, f, -1);")
        .unwrap();
    let Value::Dict(info) = session.variable("info") else {
        panic!("GetString did not produce a dictionary");
    };
    assert_eq!(info.get("ID"), Some(&Value::from("f")));
    let Some(Value::Dict(arguments)) = info.get("Arguments") else {
        panic!("missing Arguments");
    };
    assert_eq!(arguments.get("1"), Some(&Value::from("b")));
    assert!(info.contains_key("Body"));
}

#[test]
fn test_get_string_object_by_index() {
    let mut session = session();
    session
        .run_source(r#"DataSet first = ReadDataFile("a.fas"); DataSet second = ReadDataFile("b.fas"); GetString(n, DataSet, 1);"#)
        .unwrap();
    assert_eq!(session.variable("n"), &Value::from("second"));

    let message = error_text(session.run_source("GetString(n, DataSet, 5);"));
    assert!(message.contains("There is no DataSet object with index 5"));
}

#[test]
fn test_get_string_without_target() {
    let mut session = session();
    let message = error_text(session.run_source("GetString(n, nothing_here, 0);"));
    assert!(message.contains("No viable object to obtain information from"));
}

#[test]
fn test_export_function() {
    let mut session = session();
    session
        .run_source("function f(a) { return a * 2; } Export(text, f);")
        .unwrap();
    let expected = session.registry().get_by_name("f").unwrap().export();
    assert_eq!(session.variable("text"), &Value::from(expected));
}

#[test]
fn test_export_unknown() {
    let mut session = session();
    let message = error_text(session.run_source("Export(text, ghost);"));
    assert!(message.contains("'ghost' is not a function or object that can be exported"));
}

// ─── Objects ───

#[test]
fn test_declarations_reach_the_payload() {
    let mut session = session();
    session
        .run_source(r#"DataSet ds = ReadDataFile("seqs.fas"); DataSetFilter filt = CreateFilter(ds, 1);"#)
        .unwrap();
    let filter = session.objects().get("filt").unwrap();
    assert_eq!(filter.kind, ObjectKind::DataSetFilter);
    assert_eq!(filter.operation.as_deref(), Some("CreateFilter"));
    assert_eq!(filter.arguments.first(), Some(&Value::from("ds")));

    session.run_source("DeleteObject(filt, missing);").unwrap();
    assert!(!session.objects().contains("filt"));
    assert!(session
        .warnings()
        .iter()
        .any(|w| w == "'missing' is not a supported argument type for DeleteObject"));
}

#[test]
fn test_filter_needs_a_data_set() {
    let mut session = session();
    let message = error_text(session.run_source("DataSetFilter filt = CreateFilter(nope, 1);"));
    assert!(message.contains("Could not find source DataSet 'nope'"));
}

#[test]
fn test_unsupported_operation_in_soft_mode() {
    let mut session = session();
    session
        .run_source("SetParameter(HBL_EXECUTION_ERROR_HANDLING, 1, 0); Optimize(res, lf); y = 1;")
        .unwrap();
    assert_eq!(session.variable("y"), &Value::Number(1.0));
    assert_eq!(
        session.variable(LAST_EXECUTION_ERROR),
        &Value::from("Optimize is not supported by the active object layer")
    );
}

#[test]
fn test_clear_constraints_warns_on_unknown() {
    let mut session = session();
    session.run_source("x = 1; ClearConstraints(x, y);").unwrap();
    assert_eq!(
        session.warnings(),
        &["'y' is not an existing variable in call to ClearConstraints".to_string()]
    );
}

// ─── Runtime checks ───

#[test]
fn test_assert() {
    let mut session = session();
    session.run_source("assert(1 + 1 == 2);").unwrap();
    let message = error_text(session.run_source("x = 3; assert(x < 2);"));
    assert!(message.contains("Assertion 'x<2' failed.") || message.contains("Assertion 'x < 2' failed."));
    let message = error_text(session.run_source(r#"assert(0, "custom " + "text");"#));
    assert!(message.contains("custom text"));
}

#[test]
fn test_soft_assertion_finishes_the_list() {
    let handler = buffer_handler();
    let mut session = Session::builder()
        .print_handler(handler.clone())
        .soft_assertions(true)
        .build();
    session.run_source(r#"x = 1; assert(x == 2, "x is not 2"); x = 3;"#).unwrap();
    assert_eq!(session.variable("x"), &Value::Number(1.0));
    assert_eq!(handler.get_output(), "x is not 2\n");
}

#[test]
fn test_require_version() {
    let mut session = session();
    session.run_source(r#"RequireVersion("0.0.1");"#).unwrap();
    let message = error_text(session.run_source(r#"RequireVersion("99.1");"#));
    assert!(message.contains("requires at least version 99.1 of HBL"));
}

#[test]
fn test_profile_collects_executed_commands() {
    let mut session = session();
    session
        .run_source("#profile START; x = 1; x = x + 1; #profile dump;")
        .unwrap();
    let Value::Dict(dump) = session.variable("dump") else {
        panic!("profile dump is not a dictionary");
    };
    let Some(Value::Matrix(stats)) = dump.get("STATS") else {
        panic!("missing STATS");
    };
    assert_eq!((stats.rows(), stats.cols()), (2, 2));
    assert_eq!(stats.get(0, 1).unwrap(), 1.0);
    let Some(Value::Dict(instructions)) = dump.get("INSTRUCTION") else {
        panic!("missing INSTRUCTION");
    };
    assert_eq!(instructions.len(), 2);
}

#[test]
fn test_profile_dump_without_start() {
    let mut session = session();
    let message = error_text(session.run_source("#profile dump;"));
    assert!(message.contains("Profiler dump invoked before #profile START;"));
}

// ─── ChoiceList ───

const CHOICES: &str = r#"ChoiceList(c, "Pick", 1, SKIP_NONE, "A", "first", "B", "second");"#;

#[test]
fn test_choice_by_name_and_index() {
    let mut session = session();
    run_with_input(&mut session, CHOICES, &["B"]);
    assert_eq!(session.variable("c"), &Value::Number(1.0));
    assert_eq!(session.variable(SELECTION_STRINGS), &Value::from("B"));

    run_with_input(&mut session, CHOICES, &["1"]);
    assert_eq!(session.variable("c"), &Value::Number(0.0));
}

#[test]
fn test_choice_cancel_and_invalid() {
    let mut session = session();
    run_with_input(&mut session, CHOICES, &["q"]);
    assert_eq!(session.variable("c"), &Value::Number(-1.0));

    run_with_input(&mut session, CHOICES, &["Z"]);
    assert_eq!(session.variable("c"), &Value::Number(-1.0));
    assert!(session
        .warnings()
        .iter()
        .any(|w| w == "'Z' is not a valid choice in ChoiceList"));
}

#[test]
fn test_choice_skip_and_multiple() {
    let mut session = session();
    run_with_input(
        &mut session,
        r#"ChoiceList(c, "Pick", 1, 0, "A", "first", "B", "second");"#,
        &["1"],
    );
    assert_eq!(session.variable("c"), &Value::Number(1.0));

    run_with_input(
        &mut session,
        r#"ChoiceList(c, "Pick", 2, SKIP_NONE, "A", "first", "B", "second", "C", "third");"#,
        &["C", "1"],
    );
    let expected = Matrix::from_rows(vec![vec![0.0, 2.0]]).unwrap();
    assert_eq!(session.variable("c"), &Value::matrix(expected));
    let Value::Dict(names) = session.variable(SELECTION_STRINGS) else {
        panic!("multiple selections should produce a dictionary");
    };
    assert_eq!(names.get("1"), Some(&Value::from("C")));
}

#[test]
fn test_choice_from_dictionary() {
    let (mut session, output) = with_output();
    let mut options = hbl_formula::Dict::new();
    options.insert("x".to_string(), Value::from("ex"));
    options.insert("y".to_string(), Value::from("why"));
    session.set_variable("opts", Value::dict(options));

    let message = error_text(session.run_source(r#"ChoiceList(c, "Menu", 5, SKIP_NONE, opts);"#));
    assert!(message.contains("List of selections is too short in ChoiceList"));
    assert_eq!(output.get_output(), "");

    let list = Rc::new(
        session
            .build(r#"ChoiceList(c, "Menu", 1, SKIP_NONE, opts);"#, None)
            .unwrap(),
    );
    list.set_input(Some(Rc::new(RefCell::new(VecDeque::from(["y".to_string()])))));
    session.execute(&list).unwrap();
    assert_eq!(session.variable("c"), &Value::Number(1.0));
    assert_eq!(output.get_output(), "");
}

// ─── MPI ───

#[test]
fn test_mpi_round_trip_over_loopback() {
    let mut session = Session::builder()
        .print_handler(silent_handler())
        .transport(Box::new(LoopbackTransport::new()))
        .build();
    session
        .run_source(r#"MPISend(2, "return 6 * 7;"); MPIReceive(-1, node, reply);"#)
        .unwrap();
    assert_eq!(session.variable("node"), &Value::Number(2.0));
    assert_eq!(session.variable("reply"), &Value::from("42"));
}

#[test]
fn test_mpi_remote_error() {
    let mut session = Session::builder()
        .print_handler(silent_handler())
        .transport(Box::new(LoopbackTransport::new()))
        .build();
    let message = error_text(session.run_source(r#"MPISend(1, "x = (1;"); MPIReceive(1, node, reply);"#));
    assert!(message.contains("Node 1 reported an error"));
    assert_eq!(session.variable("node"), &Value::Number(1.0));
}

#[test]
fn test_mpi_without_transport() {
    let mut session = session();
    let message = error_text(session.run_source(r#"MPISend(1, "return 1;");"#));
    assert!(message.contains("MPISend requires a message transport"));
}
