//! wispr - interactive REPL for Wisp
//!
//! Reads expressions a line at a time, evaluates them on a persistent
//! interpreter, and prints the results. State accumulates across lines:
//! definitions stay bound until the process exits.
//!
//! Usage:
//!   wispr                      # start at the prompt
//!   wispr prelude.wisp         # evaluate a file, then prompt
//!   wispr --heap-words 8192    # small heap, for watching the collector
//!
//! Commands:
//!   :quit, :q                  # exit
//!   :stats                     # heap statistics as JSON
//!   :help                      # show help
//!
//! Set WISP_LOG=debug to watch collection events on stderr.

use std::path::PathBuf;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use wisp_runtime::{DEFAULT_HEAP_WORDS, DEFAULT_SYMBOL_BUCKETS, ErrorCode, Interpreter, Value};

#[derive(Parser)]
#[command(name = "wispr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interactive REPL for the Wisp interpreter", long_about = None)]
struct Args {
    /// Size of each heap semispace, in 8-byte words
    #[arg(long, default_value_t = DEFAULT_HEAP_WORDS)]
    heap_words: usize,

    /// Number of symbol-table buckets
    #[arg(long, default_value_t = DEFAULT_SYMBOL_BUCKETS)]
    symbol_buckets: usize,

    /// Source file to evaluate before the prompt
    file: Option<PathBuf>,
}

fn main() {
    init_logging();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Route library tracing to stderr, filtered by WISP_LOG.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("WISP_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut wisp = Interpreter::new(args.heap_words, args.symbol_buckets)?;

    if let Some(path) = &args.file {
        let source = std::fs::read_to_string(path)?;
        let result = wisp.eval_str(&source);
        report(&wisp, result);
    }

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("wisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match line {
                    ":quit" | ":q" => break,
                    ":stats" => println!("{}", serde_json::to_string_pretty(&wisp.stats())?),
                    ":help" => print_help(),
                    _ => {
                        let result = wisp.eval_str(line);
                        report(&wisp, result);
                    }
                }
            }
            // Ctrl-C drops the current line, Ctrl-D exits.
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// An error is fatal to the expression, never to the session.
fn report(wisp: &Interpreter, result: Result<Value, ErrorCode>) {
    match result {
        Ok(value) => println!("{}", wisp.format_value(value)),
        Err(code) => eprintln!("error: {code}"),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :quit, :q    exit");
    println!("  :stats       heap statistics as JSON");
    println!("  :help        this message");
    println!();
    println!("Anything else is read and evaluated as Wisp code.");
}
