//! mshell CLI entry point.
//!
//! Usage:
//!   mshell script.msh [args...]     # Run a program file
//!   mshell -c <program> [args...]   # Run program text
//!   mshell                          # Read the program from stdin
//!   mshell --lex script.msh         # Print tokens
//!   mshell --parse script.msh       # Print the parse tree as JSON

use std::env;
use std::io::{IsTerminal, Read};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use mshell_kernel::{parse, tokenize, EvalResult, Shell, ShellConfig, ShellError, TokenKind};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    // Diagnostics go to stderr so program output stays clean (RUST_LOG)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("mshell: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Run,
    Lex,
    Parse,
}

#[derive(Debug)]
enum Source {
    File(String),
    Inline(String),
    Stdin,
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut mode = Mode::Run;
    let mut source = None;
    let mut rest = args.iter();

    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(ExitCode::SUCCESS);
            }
            "--version" | "-V" => {
                println!("mshell {}", env!("CARGO_PKG_VERSION"));
                return Ok(ExitCode::SUCCESS);
            }
            "--lex" => mode = Mode::Lex,
            "--parse" => mode = Mode::Parse,
            "-c" => {
                let program = rest.next().context("-c requires a program argument")?;
                source = Some(Source::Inline(program.clone()));
                break;
            }
            unknown if unknown.starts_with('-') && unknown.len() > 1 => {
                eprintln!("Unknown option: {unknown}");
                eprintln!("Run 'mshell --help' for usage.");
                return Ok(ExitCode::FAILURE);
            }
            path => {
                source = Some(Source::File(path.to_string()));
                break;
            }
        }
    }

    let positional: Vec<String> = rest.cloned().collect();
    let source = source.unwrap_or(Source::Stdin);
    let text = read_source(&source)?;

    match mode {
        Mode::Lex => lex(&text),
        Mode::Parse => dump_parse(&text),
        Mode::Run => run_program(&text, positional),
    }
}

fn print_help() {
    println!(
        r#"mshell v{}

Usage:
  mshell [OPTIONS] [program-file] [args...]
  mshell [OPTIONS] -c <program> [args...]

With no program file the program is read from stdin.

Options:
  -c <program>       Run the given program text
  --lex              Print one token per line as line:col:KIND lexeme
  --parse            Print the parse tree as JSON
  -h, --help         Show this help
  -V, --version      Show version

Environment:
  MSHSTDLIB          File evaluated before the program
  RUST_LOG           Diagnostic log filter (e.g. mshell_kernel=debug)
"#,
        env!("CARGO_PKG_VERSION")
    );
}

fn read_source(source: &Source) -> Result<String> {
    match source {
        Source::File(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read program: {path}"))
        }
        Source::Inline(text) => Ok(text.clone()),
        Source::Stdin => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read program from stdin")?;
            Ok(text)
        }
    }
}

/// `--lex`: one token per line, stopping at the first lex error.
fn lex(text: &str) -> Result<ExitCode> {
    for token in tokenize(text) {
        if token.kind == TokenKind::Eof {
            break;
        }
        println!("{}", token.listing());
        if let Some(error) = token.lex_error() {
            bail!("{}: {error}", token.position());
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// `--parse`: the File as pretty JSON.
fn dump_parse(text: &str) -> Result<ExitCode> {
    let tokens = tokenize(text);
    match parse(&tokens) {
        Ok(file) => {
            let json = serde_json::to_string_pretty(&file).context("Failed to serialize parse tree")?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_program(text: &str, positional: Vec<String>) -> Result<ExitCode> {
    let config = ShellConfig::from_env()
        .with_positional_args(positional)
        .with_process_group(!std::io::stdin().is_terminal());
    tracing::debug!(?config, "starting");

    let stdlib = config.stdlib.clone();
    let mut shell = Shell::new(config);

    if let Some(path) = stdlib {
        let lib = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read stdlib: {}", path.display()))?;
        match shell.run_source(&lib) {
            Ok(result) if result.exited => return Ok(exit_code(result.exit_code)),
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                return Ok(exit_code(e.exit_code()));
            }
        }
    }

    Ok(report(shell.run_source(text)))
}

fn report(result: Result<EvalResult, ShellError>) -> ExitCode {
    match result {
        Ok(result) => exit_code(result.exit_code),
        Err(e) => {
            eprintln!("{e}");
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
