use super::*;
use hbl_ir::{CommandData, FunctionClass, Jump, MergeMode, ParameterKind, ProfileAction, ReturnTarget, ScanFormat};
use pretty_assertions::assert_eq;

fn build(source: &str) -> Result<InstructionList, BuildError> {
    let mut registry = FunctionRegistry::new();
    Builder::new(&mut registry).build(source, None)
}

fn built(source: &str) -> InstructionList {
    build(source).unwrap()
}

fn jump(list: &InstructionList, index: usize) -> Jump {
    list.command(index).and_then(Command::as_jump).cloned().unwrap()
}

fn cond(condition: &str, on_true: usize, on_false: usize) -> Jump {
    Jump {
        condition: Some(condition.to_string()),
        on_true,
        on_false,
    }
}

fn opcodes(list: &InstructionList) -> Vec<Opcode> {
    list.commands().iter().map(Command::opcode).collect()
}

// ─── Control flow ───

#[test]
fn test_for_loop_layout() {
    let list = built("x = 1; for (i = 0; i < 5; i = i + 1) { x = x * 2; } return x;");
    assert_eq!(
        opcodes(&list),
        vec![
            Opcode::Formula,
            Opcode::Formula,
            Opcode::Jump,
            Opcode::Formula,
            Opcode::Formula,
            Opcode::Jump,
            Opcode::Return,
        ]
    );
    assert_eq!(jump(&list, 2), cond("i<5", 3, 6));
    assert_eq!(jump(&list, 5), Jump::to(2));
    assert_eq!(list.command(3).and_then(|c| c.text(0)), Some("x=x*2"));
    assert_eq!(list.command(4).and_then(|c| c.text(0)), Some("i=i+1"));
    assert_eq!(
        list.command(6).map(Command::data),
        Some(&CommandData::Return(ReturnTarget::Exit))
    );
}

#[test]
fn test_if_else_targets() {
    let list = built("if (0) { return 1; } else { return 2; }");
    assert_eq!(
        opcodes(&list),
        vec![Opcode::Jump, Opcode::Return, Opcode::Jump, Opcode::Return]
    );
    assert_eq!(jump(&list, 0), cond("0", 1, 3));
    assert_eq!(jump(&list, 2), Jump::to(4));
}

#[test]
fn test_if_without_else_falls_through() {
    let list = built("if (1) { x = 1; } y = 2;");
    assert_eq!(jump(&list, 0), cond("1", 1, 2));
    assert_eq!(list.command(2).and_then(|c| c.text(0)), Some("y=2"));
}

#[test]
fn test_else_if_chain() {
    let list = built("if (a) { x = 1; } else if (b) { x = 2; } else { x = 3; }");
    assert_eq!(list.len(), 7);
    assert_eq!(jump(&list, 0), cond("a", 1, 3));
    assert_eq!(jump(&list, 2), Jump::to(5));
    assert_eq!(jump(&list, 3), cond("b", 4, 6));
    assert_eq!(jump(&list, 5), Jump::to(7));
    assert_eq!(list.command(6).and_then(|c| c.text(0)), Some("x=3"));
}

#[test]
fn test_else_without_if() {
    assert!(matches!(build("else { x = 1; }"), Err(BuildError::ElseWithoutIf)));
}

#[test]
fn test_break_jumps_past_loop() {
    let list = built("for (i = 0; i < 5; i = i + 1) { if (i == 2) { break; } }");
    assert_eq!(jump(&list, 1), cond("i<5", 2, 6));
    assert_eq!(jump(&list, 2), cond("i==2", 3, 4));
    assert_eq!(jump(&list, 3), Jump::to(6));
    assert_eq!(jump(&list, 5), Jump::to(1));
}

#[test]
fn test_continue_in_while_rechecks_condition() {
    let list = built("while (i < 5) { i = i + 1; if (i == 3) { continue; } x = x + i; }");
    assert_eq!(jump(&list, 0), cond("i<5", 1, 6));
    assert_eq!(jump(&list, 3), Jump::to(5));
    assert_eq!(jump(&list, 5), Jump::to(0));
}

#[test]
fn test_continue_in_for_runs_increment() {
    let list = built("for (i = 0; i < 3; i = i + 1) { continue; }");
    // [i=0] [check] [continue] [i=i+1] [back]
    assert_eq!(jump(&list, 2), Jump::to(3));
    assert_eq!(jump(&list, 4), Jump::to(1));
}

#[test]
fn test_break_outside_loop() {
    let err = build("break;").unwrap_err();
    assert_eq!(err.to_string(), "break only makes sense in the context of a loop.");
}

#[test]
fn test_do_while_layout() {
    let list = built("do { x = x + 1; } while (x < 3);");
    assert_eq!(opcodes(&list), vec![Opcode::Formula, Opcode::Jump]);
    assert_eq!(jump(&list, 1), cond("x<3", 0, 2));
}

#[test]
fn test_do_without_while() {
    assert!(matches!(build("do { x = 1; }"), Err(BuildError::MissingWhile)));
}

#[test]
fn test_loop_header_count() {
    let err = build("for (i = 0; i < 3) { x = 1; }").unwrap_err();
    assert!(matches!(err, BuildError::ArgumentCount { found: 2, .. }));
}

// ─── Functions and namespaces ───

#[test]
fn test_function_registration() {
    let mut registry = FunctionRegistry::new();
    let list = Builder::new(&mut registry)
        .build("function f(a, b&) { return a + b; }", None)
        .unwrap();
    assert!(list.is_empty());

    let entry = registry.get_by_name("f").unwrap();
    assert_eq!(entry.parameters, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(entry.kinds, vec![ParameterKind::Value, ParameterKind::Reference]);
    assert_eq!(entry.class, FunctionClass::Ordinary);
    // returns target the body's terminal index
    assert_eq!(
        entry.body.command(0).map(Command::data),
        Some(&CommandData::Return(ReturnTarget::Index(1)))
    );
}

#[test]
fn test_every_return_in_body_is_patched() {
    let mut registry = FunctionRegistry::new();
    Builder::new(&mut registry)
        .build("function g(x) { if (x) { return 1; } return 2; }", None)
        .unwrap();
    let body = &registry.get_by_name("g").unwrap().body;
    let end = body.len();
    let targets: Vec<_> = body
        .commands()
        .iter()
        .filter(|c| c.opcode() == Opcode::Return)
        .map(|c| c.data().clone())
        .collect();
    assert_eq!(
        targets,
        vec![
            CommandData::Return(ReturnTarget::Index(end)),
            CommandData::Return(ReturnTarget::Index(end))
        ]
    );
}

#[test]
fn test_lfunction_parameters_are_private() {
    let mut registry = FunctionRegistry::new();
    Builder::new(&mut registry)
        .build("lfunction g(x) { y = x; return y; }", None)
        .unwrap();
    let entry = registry.get_by_name("g").unwrap();
    assert_eq!(entry.class, FunctionClass::Local);
    assert_eq!(entry.parameters, vec!["_lfn1.x".to_string()]);
    assert_eq!(entry.body.namespace(), Some("_lfn1"));
}

#[test]
fn test_redeclaration_warns_and_keeps_slot() {
    let mut registry = FunctionRegistry::new();
    let mut builder = Builder::new(&mut registry);
    builder.build("function f() { return 1; }", None).unwrap();
    assert!(builder.take_warnings().is_empty());
    builder.build("function f() { return 2; }", None).unwrap();
    assert_eq!(
        builder.take_warnings(),
        vec!["Overwritten previously defined function:'f'".to_string()]
    );
    assert_eq!(registry.find("f", None), Some(0));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_nested_function_rejected() {
    let err = build("function f() { function g() { return 1; } }").unwrap_err();
    assert!(matches!(err, BuildError::NestedFunction));
}

#[test]
fn test_function_without_body() {
    assert!(matches!(
        build("function f(x);"),
        Err(BuildError::MissingFunctionBody)
    ));
}

#[test]
fn test_invalid_function_name() {
    let err = build("function 2f(x) { return x; }").unwrap_err();
    assert_eq!(err.to_string(), "Not a valid function/namespace identifier '2f'");
}

#[test]
fn test_namespace_block() {
    let mut registry = FunctionRegistry::new();
    let list = Builder::new(&mut registry)
        .build("namespace ns { x = 1; function f() { return x; } }", None)
        .unwrap();
    assert_eq!(opcodes(&list), vec![Opcode::NestedList]);

    let nested = list.command(0).and_then(Command::nested_list).unwrap();
    assert_eq!(nested.namespace(), Some("ns"));
    assert_eq!(nested.len(), 1);
    assert!(registry.get_by_name("ns.f").is_some());
}

// ─── Classification ───

#[test]
fn test_argument_count_message() {
    let err = build("GetString(a, b);").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Incorrect number of arguments (2) supplied: expected one of {3,4}, while processing 'GetString(a,b)'. "
    );
}

#[test]
fn test_keyword_prefixed_identifiers_are_formulas() {
    let list = built("returned = 1; elsewhere = 2; breakpoint = 3;");
    assert_eq!(opcodes(&list), vec![Opcode::Formula; 3]);
    assert_eq!(list.command(0).and_then(|c| c.text(0)), Some("returned=1"));
}

#[test]
fn test_compound_line_is_split() {
    let list = built("{x = 1; y = 2;}");
    assert_eq!(opcodes(&list), vec![Opcode::Formula, Opcode::Formula]);
    assert_eq!(list.command(1).and_then(|c| c.text(0)), Some("y=2"));
}

#[test]
fn test_generic_command_arguments() {
    let list = built("fprintf(stdout, \"a, b\", x);");
    let command = list.command(0).unwrap();
    assert_eq!(command.opcode(), Opcode::Fprintf);
    assert_eq!(command.texts_from(0).collect::<Vec<_>>(), vec!["stdout", "\"a, b\"", "x"]);
}

#[test]
fn test_empty_source() {
    assert!(built("  // nothing\n").is_empty());
    let mut registry = FunctionRegistry::new();
    let err = Builder::new(&mut registry).build_list("/* */", None, false);
    assert!(matches!(err, Err(BuildError::Empty(_))));
}

// ─── Constructs ───

#[test]
fn test_fscanf_descriptors() {
    let list = built("fscanf(stdin, \"Number,String\", n, s);");
    let command = list.command(0).unwrap();
    assert_eq!(command.opcode(), Opcode::Fscanf);
    assert_eq!(command.texts_from(0).collect::<Vec<_>>(), vec!["stdin", "n", "s"]);
    assert_eq!(
        command.data(),
        &CommandData::Scan {
            formats: vec![ScanFormat::Number, ScanFormat::String],
            rewind: false
        }
    );

    let list = built("sscanf(text, REWIND, \"Lines\", rows);");
    assert_eq!(
        list.command(0).map(Command::data),
        Some(&CommandData::Scan {
            formats: vec![ScanFormat::Lines],
            rewind: true
        })
    );
}

#[test]
fn test_fscanf_errors() {
    let err = build("fscanf(stdin, \"Float\", n);").unwrap_err();
    assert!(err.to_string().starts_with("Float is not a valid type descriptor for fscanf."));

    let err = build("fscanf(stdin, \"Number,Number\", n);").unwrap_err();
    assert_eq!(
        err.to_string(),
        "fscanf passed 2 parameter type descriptors and 1 actual arguments"
    );

    let err = build("fscanf(stdin, \"Number\");").unwrap_err();
    assert_eq!(err.to_string(), "Too few arguments in call to fscanf or sscanf");
}

#[test]
fn test_data_set_declarations() {
    let list = built("DataSet ds = ReadDataFile(\"data.nex\");");
    let command = list.command(0).unwrap();
    assert_eq!(command.opcode(), Opcode::DataSet);
    assert_eq!(command.texts_from(0).collect::<Vec<_>>(), vec!["ds", "\"data.nex\""]);
    assert_eq!(command.data(), &CommandData::DataSet { from_string: false });

    let list = built("DataSet all = Concatenate(purge, a, b);");
    let command = list.command(0).unwrap();
    assert_eq!(command.opcode(), Opcode::DataSetMerge);
    assert_eq!(command.texts_from(0).collect::<Vec<_>>(), vec!["all", "a", "b"]);
    assert_eq!(
        command.data(),
        &CommandData::Merge {
            mode: MergeMode::Concatenate,
            purge: true
        }
    );

    let err = build("DataSet = ReadDataFile(\"x\");").unwrap_err();
    assert_eq!(err.to_string(), "DataSet declaration missing a valid identifier");
    let err = build("DataSet ds = Combine();").unwrap_err();
    assert_eq!(
        err.to_string(),
        "DataSet merging operation missing a valid list of arguments."
    );
}

#[test]
fn test_filter_carries_operation() {
    let list = built("DataSetFilter f = CreateFilter(ds, 1);");
    let command = list.command(0).unwrap();
    assert_eq!(command.opcode(), Opcode::DataSetFilter);
    assert_eq!(
        command.texts_from(0).collect::<Vec<_>>(),
        vec!["f", "CreateFilter", "ds", "1"]
    );
    assert!(build("DataSetFilter f = Permute(ds);").is_err());
}

#[test]
fn test_model_argument_bounds() {
    assert_eq!(built("Model m = (Q, freqs);").command(0).map(Command::opcode), Some(Opcode::Model));
    let err = build("Model m = (Q);").unwrap_err();
    assert!(err.to_string().starts_with("Parameter(s) missing in Model definition."));
    let err = build("Model m = (Q, f, a, b);").unwrap_err();
    assert_eq!(err.to_string(), "Too many parameters (3 max) in Model definition");
}

#[test]
fn test_likelihood_function_flags() {
    let list = built("LikelihoodFunction3 lf = (filter, tree, freqs);");
    let command = list.command(0).unwrap();
    assert_eq!(command.opcode(), Opcode::LikelihoodFunction);
    assert_eq!(
        command.data(),
        &CommandData::Likelihood {
            explicit_frequencies: true
        }
    );
    assert_eq!(command.parameter_count(), 4);
}

#[test]
fn test_tree_declaration() {
    let list = built("Tree t = \"((a,b),c)\";");
    let command = list.command(0).unwrap();
    assert_eq!(command.opcode(), Opcode::Tree);
    assert_eq!(command.texts_from(0).collect::<Vec<_>>(), vec!["t", "\"((a,b),c)\""]);
}

#[test]
fn test_choice_list_inline_pairs() {
    let list = built("ChoiceList(pick, \"Pick\", 1, SKIP_NONE, \"A\", \"first\", \"B\", \"second\");");
    let command = list.command(0).unwrap();
    assert_eq!(command.data(), &CommandData::Choice { inline: true });
    assert_eq!(
        command.texts_from(4).collect::<Vec<_>>(),
        vec!["A", "first", "B", "second"]
    );
    assert!(build("ChoiceList(pick, \"Pick\", 1, SKIP_NONE);").is_err());
}

#[test]
fn test_execute_commands_parameters() {
    let list = built("ExecuteCommands(code, \"compiled\");");
    let command = list.command(0).unwrap();
    assert_eq!(command.data(), &CommandData::Execute { compiled: true });
    assert_eq!(command.text(2), Some(""));

    let list = built("ExecuteCommands(code, compiled);");
    assert_eq!(
        list.command(0).map(Command::data),
        Some(&CommandData::Execute { compiled: true })
    );

    let list = built("ExecuteCommands(code, input, \"ns\");");
    let command = list.command(0).unwrap();
    assert_eq!(command.texts_from(0).collect::<Vec<_>>(), vec!["code", "", "input", "\"ns\""]);
}

#[test]
fn test_mpi_argument_counts() {
    assert!(build("MPISend(1);").is_err());
    assert!(build("MPIReceive(-1, node);").is_err());
    assert_eq!(
        built("MPIReceive(-1, node, result);").command(0).map(Command::opcode),
        Some(Opcode::MpiReceive)
    );
}

#[test]
fn test_profile_actions() {
    let list = built("#profile START; x = 1; #profile stats;");
    assert_eq!(
        list.command(0).map(Command::data),
        Some(&CommandData::Profile(ProfileAction::Start))
    );
    let collect = list.command(2).unwrap();
    assert_eq!(collect.data(), &CommandData::Profile(ProfileAction::Collect));
    assert_eq!(collect.text(0), Some("stats"));
}

#[test]
fn test_include_builds_in_place() {
    let path = std::env::temp_dir().join("hbl_build_include_probe.bf");
    std::fs::write(&path, "y = 2; z = 3;").unwrap();
    let source = format!("x = 1; #include \"{}\"; w = 4;", path.display());
    let list = built(&source);
    let texts: Vec<_> = list.commands().iter().filter_map(|c| c.text(0)).collect();
    assert_eq!(texts, vec!["x=1", "y=2", "z=3", "w=4"]);
}

#[test]
fn test_include_errors() {
    assert!(matches!(
        build("#include name;"),
        Err(BuildError::IncludeFilename(_))
    ));
    let err = build("#include \"hbl_no_such_include.bf\";").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Could not read batch file 'hbl_no_such_include.bf'."
    );
}
