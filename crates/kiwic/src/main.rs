//! The Kiwi CLI.
//!
//! Subcommands:
//!
//! - `kiwic run <file>` - parse, analyze, and tree-evaluate a program
//! - `kiwic exec <file>` - parse, analyze, compile to the VM tape, execute
//! - `kiwic check <file>` - parse and analyze only (`--dump-bindings`)
//! - `kiwic lex <file>` - print the token stream (`--unlex` to round-trip)
//! - `kiwic parse <file>` - pretty-print the parsed module
//! - `kiwic repl` - interactive session over the tree evaluator
//!
//! Exit code is non-zero whenever diagnostics were produced.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use clap::{Parser as ClapParser, Subcommand};

use kiwi_eval::TreeEvaluator;
use kiwi_lexer::unlex::{debug_tokens, unlex};
use kiwi_lexer::Lexer;
use kiwi_parser::error::ParseError;
use kiwi_parser::ops::{expr_to_string, print_module};
use kiwi_sema::diagnostics::render_diagnostic;
use kiwi_sema::SemanticAnalyser;
use kiwi_vm::VmExec;

#[derive(ClapParser)]
#[command(name = "kiwic", version, about = "The Kiwi language driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program with the tree evaluator
    Run {
        /// Path to the source file
        file: PathBuf,
    },
    /// Compile to the VM tape and execute
    Exec {
        /// Path to the source file
        file: PathBuf,

        /// Print the compiled instruction tape before executing
        #[arg(long = "dump-tape")]
        dump_tape: bool,
    },
    /// Parse and analyze without executing
    Check {
        /// Path to the source file
        file: PathBuf,

        /// Print the binding table after analysis
        #[arg(long = "dump-bindings")]
        dump_bindings: bool,
    },
    /// Print the token stream
    Lex {
        /// Path to the source file
        file: PathBuf,

        /// Reconstruct source text from the tokens instead
        #[arg(long)]
        unlex: bool,
    },
    /// Parse and pretty-print the module
    Parse {
        /// Path to the source file
        file: PathBuf,
    },
    /// Interactive session
    Repl,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run { file } => run(&file),
        Commands::Exec { file, dump_tape } => exec(&file, dump_tape),
        Commands::Check {
            file,
            dump_bindings,
        } => check(&file, dump_bindings),
        Commands::Lex { file, unlex } => lex(&file, unlex),
        Commands::Parse { file } => parse_only(&file),
        Commands::Repl => repl(),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("error: {message}");
            }
            ExitCode::FAILURE
        }
    }
}

fn read_source(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {e}", path.display()))
}

/// Parse and analyze; report every diagnostic. Errors out (with an empty
/// message, diagnostics already printed) when any were produced.
fn front_end(
    source: &str,
    path: &Path,
) -> Result<(kiwi_parser::ast::Module, SemanticAnalyser), String> {
    let result = kiwi_parser::parse(source);
    let parse_failed = report_parse_errors(source, path, &result.errors);

    let mut module = result.module;
    let mut sema = SemanticAnalyser::new();
    sema.exec(&mut module);

    for error in &sema.errors {
        eprintln!("{}", render_diagnostic(error, source));
    }

    if parse_failed || sema.has_errors() {
        return Err(String::new());
    }
    Ok((module, sema))
}

fn report_parse_errors(source: &str, path: &Path, errors: &[ParseError]) -> bool {
    for error in errors {
        let span = error.span.start as usize..error.span.end.max(error.span.start + 1) as usize;
        let span = span.start.min(source.len())..span.end.min(source.len().max(1));
        let mut buf = Vec::new();
        Report::build(ReportKind::Error, span.clone())
            .with_message(error.to_string())
            .with_config(Config::default().with_color(false))
            .with_label(
                Label::new(span)
                    .with_message("here")
                    .with_color(Color::Red),
            )
            .finish()
            .write(Source::from(source), &mut buf)
            .ok();
        eprintln!("{}", String::from_utf8_lossy(&buf));
        log::debug!("recovered tokens: {:?}", error.tokens);
        let _ = path;
    }
    !errors.is_empty()
}

fn run(path: &Path) -> Result<(), String> {
    let source = read_source(path)?;
    let (module, sema) = front_end(&source, path)?;

    let mut evaluator = TreeEvaluator::new(&module, &sema);
    match evaluator.eval_module() {
        Ok(value) => {
            if value != kiwi_common::value::Value::None {
                println!("{value}");
            }
            Ok(())
        }
        Err(exception) => Err(format!("unhandled exception: {exception}")),
    }
}

fn exec(path: &Path, dump_tape: bool) -> Result<(), String> {
    let source = read_source(path)?;
    let (mut module, sema) = front_end(&source, path)?;

    let program = kiwi_vm::compile(&mut module);
    if dump_tape {
        println!("{}", program.dump());
    }

    let mut vm = VmExec::new(&module, &sema);
    vm.execute(&module, &program, 0)
        .map_err(|exc| format!("unhandled exception: {exc}"))?;

    if program.find_label("main").is_some() {
        let value = vm
            .call_label(&module, &program, "main", Vec::new())
            .map_err(|exc| format!("unhandled exception: {exc}"))?;
        if value != kiwi_common::value::Value::None {
            println!("{value}");
        }
    }
    Ok(())
}

fn check(path: &Path, dump_bindings: bool) -> Result<(), String> {
    let source = read_source(path)?;
    let (module, sema) = front_end(&source, path)?;

    if dump_bindings {
        print!(
            "{}",
            sema.bindings.dump(|ty| expr_to_string(&module.ast, ty))
        );
    }
    Ok(())
}

fn lex(path: &Path, reconstruct: bool) -> Result<(), String> {
    let source = read_source(path)?;
    let tokens = Lexer::tokenize(&source);
    if reconstruct {
        print!("{}", unlex(&tokens));
    } else {
        print!("{}", debug_tokens(&tokens, &source));
    }
    Ok(())
}

fn parse_only(path: &Path) -> Result<(), String> {
    let source = read_source(path)?;
    let result = kiwi_parser::parse(&source);
    let failed = report_parse_errors(&source, path, &result.errors);
    print!("{}", print_module(&result.module));
    if failed {
        Err(String::new())
    } else {
        Ok(())
    }
}

/// Interactive loop: each line (or indented block) goes through the full
/// lexer/parser/sema pipeline and evaluates against persistent state.
fn repl() -> Result<(), String> {
    let mut editor = rustyline::DefaultEditor::new()
        .map_err(|e| format!("failed to start the line editor: {e}"))?;
    println!("kiwi repl -- empty line to finish a block, ctrl-d to exit");

    let mut history: Vec<String> = Vec::new();

    loop {
        let mut snippet = String::new();
        match editor.readline(">>> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(&line);
                let opens_block = line.trim_end().ends_with(':');
                snippet.push_str(&line);
                snippet.push('\n');
                if opens_block {
                    loop {
                        match editor.readline("... ") {
                            Ok(more) if more.trim().is_empty() => break,
                            Ok(more) => {
                                let _ = editor.add_history_entry(&more);
                                snippet.push_str(&more);
                                snippet.push('\n');
                            }
                            Err(_) => break,
                        }
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => continue,
            Err(_) => break,
        }

        if snippet.trim().is_empty() {
            continue;
        }

        // Re-analyze the whole accumulated session so bindings persist;
        // the module arena is per-session, exactly like a file.
        history.push(snippet);
        let source: String = history.concat();

        let result = kiwi_parser::parse(&source);
        if report_parse_errors(&source, Path::new("<repl>"), &result.errors) {
            history.pop();
            continue;
        }

        let mut module = result.module;
        module.kind = kiwi_parser::ast::ModuleKind::Interactive;
        let mut sema = SemanticAnalyser::new();
        sema.exec(&mut module);
        if sema.has_errors() {
            for error in &sema.errors {
                eprintln!("{}", render_diagnostic(error, &source));
            }
            history.pop();
            continue;
        }

        let mut evaluator = TreeEvaluator::new(&module, &sema);
        match evaluator.eval_module() {
            Ok(value) => {
                if value != kiwi_common::value::Value::None {
                    println!("{value}");
                }
            }
            Err(exception) => {
                eprintln!("unhandled exception: {exception}");
                history.pop();
            }
        }
    }

    Ok(())
}
