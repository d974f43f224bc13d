//! Subcommand implementations.
//!
//! Each command returns the message to report on failure; `main` prints it
//! and exits with status 1.

use std::fs;
use std::path::{Path, PathBuf};

use hbl_exec::{stdout_handler, Session};
use hbl_ir::ErrorMode;

/// Environment variable holding `:`-separated library directories.
pub const LIBRARY_PATH_VAR: &str = "HBL_LIBRARY_PATH";

/// Options accepted by `hbl run`.
#[derive(Debug, Default, PartialEq)]
pub struct RunOptions {
    pub file: Option<PathBuf>,
    pub compile: bool,
    pub soft_errors: bool,
    pub soft_assertions: bool,
    pub include_dirs: Vec<PathBuf>,
}

impl RunOptions {
    /// Parse the arguments following `run`.
    pub fn parse(args: &[String]) -> Result<RunOptions, String> {
        let mut options = RunOptions::default();
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--compile" | "-c" => options.compile = true,
                "--soft-errors" => options.soft_errors = true,
                "--soft-assert" => options.soft_assertions = true,
                "-I" => {
                    i += 1;
                    let Some(dir) = args.get(i) else {
                        return Err("-I requires a directory".to_string());
                    };
                    options.include_dirs.push(PathBuf::from(dir));
                }
                other => {
                    if let Some(dir) = other.strip_prefix("-I") {
                        options.include_dirs.push(PathBuf::from(dir));
                    } else if other.starts_with('-') {
                        return Err(format!("unknown option '{other}'"));
                    } else if options.file.is_none() {
                        options.file = Some(PathBuf::from(other));
                    } else {
                        return Err(format!("unexpected argument '{other}'"));
                    }
                }
            }
            i += 1;
        }
        Ok(options)
    }
}

/// Directories listed in a `HBL_LIBRARY_PATH` value; empty entries are
/// skipped.
pub fn library_dirs(value: Option<&str>) -> Vec<PathBuf> {
    value
        .unwrap_or_default()
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// `hbl run`: execute a batch file, printing any warnings to stderr.
pub fn run_file(options: &RunOptions) -> Result<(), String> {
    let Some(path) = &options.file else {
        return Err("missing file path".to_string());
    };
    let library = std::env::var(LIBRARY_PATH_VAR).ok();
    let mode = if options.soft_errors {
        ErrorMode::Soft
    } else {
        ErrorMode::Abort
    };

    let mut session = Session::builder()
        .print_handler(stdout_handler())
        .error_mode(mode)
        .soft_assertions(options.soft_assertions)
        .compile(options.compile)
        .search_paths(options.include_dirs.iter().cloned())
        .search_paths(library_dirs(library.as_deref()))
        .build();

    tracing::debug!(path = %path.display(), compile = options.compile, "running batch file");
    let outcome = session.run_file(path);
    for warning in session.take_warnings() {
        eprintln!("warning: {warning}");
    }
    outcome.map(|_| ()).map_err(|err| err.to_string())
}

/// `hbl segment`: print one statement per line, whitespace outside string
/// literals removed.
pub fn segment_file(path: &Path) -> Result<(), String> {
    let source = read(path)?;
    let statements = hbl_segment::segment_all(&source).map_err(|err| err.to_string())?;
    for statement in statements {
        println!("{statement}");
    }
    Ok(())
}

/// `hbl disasm`: build a file without running it and print the top-level
/// list followed by the body of every function it declares.
pub fn disassemble_file(path: &Path) -> Result<(), String> {
    let source = read(path)?;
    let mut session = Session::builder().print_handler(stdout_handler()).build();
    let list = session.build(&source, None).map_err(|err| err.to_string())?;
    println!("{list}");

    let registry = session.registry();
    for entry in (0..registry.len()).filter_map(|slot| registry.get(slot)) {
        println!();
        println!("{} {}({}):", entry.class.keyword(), entry.name, entry.parameters.join(", "));
        println!("{}", entry.body);
    }
    for warning in session.take_warnings() {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|err| format!("could not read '{}': {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_run_options() {
        let parsed = RunOptions::parse(&args(&["prog.bf", "--compile", "-I", "lib", "-Iextra", "--soft-assert"]));
        assert_eq!(
            parsed,
            Ok(RunOptions {
                file: Some(PathBuf::from("prog.bf")),
                compile: true,
                soft_errors: false,
                soft_assertions: true,
                include_dirs: vec![PathBuf::from("lib"), PathBuf::from("extra")],
            })
        );
    }

    #[test]
    fn test_run_option_errors() {
        assert_eq!(RunOptions::parse(&args(&["-I"])), Err("-I requires a directory".to_string()));
        assert_eq!(
            RunOptions::parse(&args(&["--fast"])),
            Err("unknown option '--fast'".to_string())
        );
        assert_eq!(
            RunOptions::parse(&args(&["a.bf", "b.bf"])),
            Err("unexpected argument 'b.bf'".to_string())
        );
    }

    #[test]
    fn test_library_dirs() {
        assert_eq!(
            library_dirs(Some("/opt/hbl::lib")),
            vec![PathBuf::from("/opt/hbl"), PathBuf::from("lib")]
        );
        assert!(library_dirs(None).is_empty());
    }
}
