use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use loxvm::diagnostic::{Diagnostic, ansi::AnsiRenderer, json, registry};
use loxvm::value::print_value;
use loxvm::vm::{EXIT_IO_ERROR, InterpretError, Vm};
use loxvm::VmConfig;

/// Bad command line or config file.
const EXIT_USAGE: u8 = 64;

#[derive(Parser)]
#[command(name = "loxvm")]
#[command(about = "Compile and run Lox expressions on a bytecode VM", long_about = None)]
struct Cli {
    /// Source file to run; starts a REPL when omitted
    file: Option<PathBuf>,

    /// Run CODE instead of a file
    #[arg(short = 'e', long, value_name = "CODE", conflicts_with = "file")]
    eval: Option<String>,

    /// JSON file with VM settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop a run after N instructions
    #[arg(long, value_name = "N")]
    max_instructions: Option<u64>,

    /// Operand stack capacity
    #[arg(long, value_name = "N")]
    stack_capacity: Option<usize>,

    /// Print diagnostics as JSON, one object per line
    #[arg(long)]
    json: bool,

    /// Disable ANSI colors in diagnostics
    #[arg(long)]
    no_color: bool,

    /// Log every dispatched instruction to stderr
    #[arg(long)]
    trace: bool,

    /// Explain an error code, e.g. LOX-R003
    #[arg(long, value_name = "CODE")]
    explain: Option<String>,
}

struct Reporter {
    json: bool,
    ansi: AnsiRenderer,
}

impl Reporter {
    fn emit(&self, d: &Diagnostic) {
        if self.json {
            eprintln!("{}", json::render(d));
        } else {
            eprint!("{}", self.ansi.render(d));
        }
    }
}

fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("loxvm=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_config(cli: &Cli, reporter: &Reporter) -> Result<VmConfig, ExitCode> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                reporter.emit(&Diagnostic::error(format!("cannot read config {}: {e}", path.display())));
                ExitCode::from(EXIT_IO_ERROR)
            })?;
            VmConfig::from_json(&text).map_err(|e| {
                reporter.emit(&Diagnostic::error(format!("invalid config {}: {e}", path.display())));
                ExitCode::from(EXIT_USAGE)
            })?
        }
        None => VmConfig::default(),
    };
    if let Some(n) = cli.max_instructions {
        config.instruction_budget = Some(n);
    }
    if let Some(n) = cli.stack_capacity {
        config.stack_capacity = n;
    }
    tracing::debug!(?config, "vm config");
    Ok(config)
}

fn explain(code: &str) -> ExitCode {
    match registry::lookup(code) {
        Some(entry) => {
            println!("{}: {}\n", entry.code, entry.short);
            print!("{}", entry.long);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("unknown error code '{code}'");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Runs one source text to completion, printing the result or the diagnostic.
fn run_source(vm: &mut Vm, source: &str, reporter: &Reporter) -> Result<(), InterpretError> {
    match vm.interpret(source) {
        Ok(value) => {
            print_value(value, vm.heap());
            println!();
            Ok(())
        }
        Err(e) => {
            reporter.emit(&Diagnostic::for_interpret_error(&e, source));
            Err(e)
        }
    }
}

fn repl(vm: &mut Vm, reporter: &Reporter) -> ExitCode {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    loop {
        print!("> ");
        // a closed stdout ends the session like EOF does
        if std::io::stdout().flush().is_err() {
            return ExitCode::SUCCESS;
        }
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => {
                println!();
                return ExitCode::SUCCESS;
            }
            Ok(_) => {
                if !line.trim().is_empty() {
                    // errors were already reported; keep reading
                    let _ = run_source(vm, line.trim_end(), reporter);
                }
            }
            Err(e) => {
                reporter.emit(&Diagnostic::error(format!("cannot read stdin: {e}")));
                return ExitCode::from(EXIT_IO_ERROR);
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.trace);

    if let Some(code) = &cli.explain {
        return explain(code);
    }

    let reporter = Reporter {
        json: cli.json,
        ansi: AnsiRenderer { use_color: !cli.no_color && std::io::stderr().is_terminal() },
    };

    let config = match load_config(&cli, &reporter) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let mut vm = Vm::new(config);

    let source = match (&cli.eval, &cli.file) {
        (Some(code), _) => code.clone(),
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                reporter.emit(&Diagnostic::error(format!("cannot read {}: {e}", path.display())));
                return ExitCode::from(EXIT_IO_ERROR);
            }
        },
        (None, None) => return repl(&mut vm, &reporter),
    };

    let status = match run_source(&mut vm, &source, &reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(e.exit_code()),
    };
    vm.free();
    tracing::debug!(stats = ?vm.heap().stats(), "vm freed");
    status
}
