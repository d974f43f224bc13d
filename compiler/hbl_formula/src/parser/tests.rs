use super::*;
use pretty_assertions::assert_eq;

struct OneFunction;

impl FunctionLookup for OneFunction {
    fn find_function(&self, name: &str, _namespace: Option<&str>) -> Option<usize> {
        (name == "double").then_some(7)
    }
}

fn parse_in(source: &str, namespace: Option<&str>) -> (Result<Statement, FormulaError>, VariableTable) {
    let mut variables = VariableTable::new();
    let result = {
        let mut cx = ParseContext {
            variables: &mut variables,
            functions: &OneFunction,
            namespace,
        };
        parse_statement(source, &mut cx)
    };
    (result, variables)
}

fn expression_ops(source: &str) -> Vec<Op> {
    match parse_in(source, None).0.unwrap() {
        Statement::Expression(f) => f.ops().to_vec(),
        other => panic!("not an expression: {other:?}"),
    }
}

#[test]
fn test_precedence() {
    assert_eq!(
        expression_ops("1+2*3"),
        vec![
            Op::Number(1.0),
            Op::Number(2.0),
            Op::Number(3.0),
            Op::Binary(BinaryOp::Mul),
            Op::Binary(BinaryOp::Add),
        ]
    );
}

#[test]
fn test_left_associative_subtraction() {
    assert_eq!(
        expression_ops("5-2-1"),
        vec![
            Op::Number(5.0),
            Op::Number(2.0),
            Op::Binary(BinaryOp::Sub),
            Op::Number(1.0),
            Op::Binary(BinaryOp::Sub),
        ]
    );
}

#[test]
fn test_power_binds_tighter_than_negation() {
    assert_eq!(
        expression_ops("-2^2"),
        vec![
            Op::Number(2.0),
            Op::Number(2.0),
            Op::Binary(BinaryOp::Pow),
            Op::Unary(UnaryOp::Neg),
        ]
    );
    assert_eq!(expression_ops("-3"), vec![Op::Number(-3.0)]);
}

#[test]
fn test_assignment_targets() {
    let (result, vars) = parse_in("x = y + 1", None);
    let Statement::Assign { target, value } = result.unwrap() else {
        panic!("expected assignment");
    };
    assert_eq!(vars.name(target), "x");
    assert_eq!(value.ops().len(), 3);
}

#[test]
fn test_compound_assignment_expands() {
    let (result, vars) = parse_in("x += 2", None);
    let Statement::Assign { target, value } = result.unwrap() else {
        panic!("expected assignment");
    };
    assert_eq!(
        value.ops(),
        &[Op::Var(target), Op::Number(2.0), Op::Binary(BinaryOp::Add)]
    );
    assert_eq!(vars.name(target), "x");
}

#[test]
fn test_indexed_assignment_keeps_read_form() {
    let (result, vars) = parse_in("m[1][2] = 5", None);
    let Statement::AssignIndexed { target, .. } = result.unwrap() else {
        panic!("expected indexed assignment");
    };
    let m = vars.lookup("m").unwrap();
    assert_eq!(
        target.ops(),
        &[Op::Var(m), Op::Number(1.0), Op::Number(2.0), Op::Index(2)]
    );
}

#[test]
fn test_invalid_assignment_target() {
    assert_eq!(
        parse_in("1 + x = 2", None).0,
        Err(FormulaError::InvalidAssignmentTarget("1 + x".into()))
    );
}

#[test]
fn test_namespace_qualifies_variables() {
    let (_, vars) = parse_in("a = ^b + c", Some("ns"));
    assert!(vars.lookup("ns.a").is_some());
    assert!(vars.lookup("b").is_some());
    assert!(vars.lookup("ns.c").is_some());
    assert!(vars.lookup("ns.b").is_none());
}

#[test]
fn test_constant_matrix_folded() {
    let mut variables = VariableTable::new();
    let mut cx = ParseContext {
        variables: &mut variables,
        functions: &NoFunctions,
        namespace: None,
    };
    let f = parse_expression("{{1,2}{3,-4}}", &mut cx).unwrap();
    let expected = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, -4.0]]).unwrap();
    assert_eq!(f.ops(), &[Op::Const(Value::matrix(expected))]);
    assert!(!f.is_volatile());
}

#[test]
fn test_non_constant_matrix_is_volatile() {
    let mut variables = VariableTable::new();
    let mut cx = ParseContext {
        variables: &mut variables,
        functions: &NoFunctions,
        namespace: None,
    };
    let f = parse_expression("{{x,1},{2,3}}", &mut cx).unwrap();
    assert!(f.is_volatile());
    assert_eq!(f.ops().last(), Some(&Op::MatrixBuild { rows: 2, cols: 2 }));
}

#[test]
fn test_ragged_matrix_rejected() {
    let (result, _) = parse_in("m = {{1,2}{3}}", None);
    assert!(matches!(result, Err(FormulaError::RaggedMatrix(_))));
}

#[test]
fn test_dictionary_literals() {
    let mut expected = Dict::new();
    expected.insert("a".into(), Value::Number(1.0));
    expected.insert("b".into(), Value::from("x"));
    assert_eq!(
        expression_ops("{\"a\":1, \"b\":\"x\"}"),
        vec![Op::Const(Value::dict(expected))]
    );
    assert_eq!(expression_ops("{}"), vec![Op::Const(Value::dict(Dict::new()))]);
}

#[test]
fn test_calls_resolve_builtins_and_user_functions() {
    assert_eq!(
        expression_ops("Max(1,2)"),
        vec![Op::Number(1.0), Op::Number(2.0), Op::Builtin(Builtin::Max)]
    );
    let (result, vars) = parse_in("double(y)", None);
    let y = vars.lookup("y").unwrap();
    let Statement::Expression(f) = result.unwrap() else {
        panic!("expected expression");
    };
    assert_eq!(
        f.ops().last(),
        Some(&Op::Call {
            slot: 7,
            name: "double".into(),
            refs: SmallVec::from_slice(&[Some(y)]),
        })
    );
}

#[test]
fn test_unknown_function_and_arity() {
    assert_eq!(
        parse_in("nope(1)", None).0,
        Err(FormulaError::UnknownFunction("nope".into()))
    );
    assert_eq!(
        parse_in("Abs(1,2)", None).0,
        Err(FormulaError::WrongArity {
            name: "Abs",
            expected: 1,
            found: 2
        })
    );
}

#[test]
fn test_trailing_tokens_rejected() {
    assert!(matches!(
        parse_in("x = 1 2", None).0,
        Err(FormulaError::UnexpectedToken { position: 6, .. })
    ));
    assert!(matches!(
        parse_in("x = (1", None).0,
        Err(FormulaError::UnexpectedEnd(_))
    ));
}
