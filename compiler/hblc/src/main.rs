//! HBL batch-file runner.

use std::path::Path;
use std::sync::Once;

mod commands;

use commands::{disassemble_file, run_file, segment_file, RunOptions};

static TRACING_INIT: Once = Once::new();

/// Enable with `RUST_LOG=hbl_exec=debug` or `RUST_LOG=hbl_build=trace`.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    });
}

fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];
    let outcome = match command.as_str() {
        "run" => match RunOptions::parse(&args[2..]) {
            Ok(options) if options.file.is_some() => run_file(&options),
            Ok(_) => usage_error("hbl run <file.bf> [--compile] [--soft-errors] [--soft-assert] [-I dir]"),
            Err(message) => Err(message),
        },
        "segment" => match args.get(2) {
            Some(path) => segment_file(Path::new(path)),
            None => usage_error("hbl segment <file.bf>"),
        },
        "disasm" => match args.get(2) {
            Some(path) => disassemble_file(Path::new(path)),
            None => usage_error("hbl disasm <file.bf>"),
        },
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "version" | "--version" | "-v" => {
            println!("HBL {}", hbl_exec::HBL_VERSION);
            Ok(())
        }
        _ => {
            // A bare batch file path runs it with default options
            if Path::new(command)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("bf"))
            {
                run_file(&RunOptions {
                    file: Some(command.into()),
                    ..RunOptions::default()
                })
            } else {
                eprintln!("Unknown command: {command}");
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    };

    if let Err(message) = outcome {
        eprintln!("error: {message}");
        std::process::exit(1);
    }
}

fn usage_error(usage: &str) -> Result<(), String> {
    Err(format!("missing file path\nUsage: {usage}"))
}

fn print_usage() {
    println!("HBL batch language");
    println!();
    println!("Usage: hbl <command> [options]");
    println!();
    println!("Commands:");
    println!("  run <file.bf>        Run a batch file");
    println!("  segment <file.bf>    Print the file's statements, one per line");
    println!("  disasm <file.bf>     Build without running and print the instruction lists");
    println!("  help                 Show this help message");
    println!("  version              Show version information");
    println!();
    println!("Run options:");
    println!("  --compile, -c        Lower numeric lists onto the fast path");
    println!("  --soft-errors        Record execution errors in LAST_EXECUTION_ERROR and continue");
    println!("  --soft-assert        Failed assertions print their message and end the current list");
    println!("  -I <dir>             Add a directory searched by #include and ExecuteAFile");
    println!();
    println!("Environment:");
    println!("  HBL_LIBRARY_PATH     ':'-separated library directories, searched after -I");
    println!("  RUST_LOG             Enable tracing output (e.g. RUST_LOG=hbl_exec=debug)");
}
