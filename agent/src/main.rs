//! Bank statement parser generation agent.
//!
//! `agent run --target icici` reads `data/icici/icici sample.pdf` and
//! `data/icici/result.csv`, asks the configured model for a parser, and keeps
//! repairing it until its output matches the CSV or the attempts run out.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use agent::core::types::RunContext;
use agent::exit_codes;
use agent::extract::extract_structure;
use agent::io::artifact::ArtifactStore;
use agent::io::config::{AgentConfig, CONFIG_FILE, load_config};
use agent::io::document::PdfplumberReader;
use agent::io::generator::build_generator;
use agent::io::prompt::PromptBuilder;
use agent::io::report::{RunReport, write_report};
use agent::io::sandbox::PythonSandbox;
use agent::logging;
use agent::looping::{Agent, LoopEvent, LoopOutcome, LoopStop};
use agent::targets::resolve_inputs;
use agent::validate::validate_parser;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "agent",
    version,
    about = "Generate and validate bank statement PDF parsers"
)]
struct Cli {
    /// Config file (missing file means defaults).
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Enable debug tracing for this crate (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a parser for a target and save it once it validates.
    Run {
        /// Target folder under the data directory (e.g. `icici`).
        #[arg(short, long)]
        target: String,
    },
    /// Validate an existing parser against the target's sample without calling the model.
    Check {
        #[arg(short, long)]
        target: String,
        /// Parser to check (default: the saved parser for the target).
        #[arg(long)]
        parser: Option<PathBuf>,
    },
    /// Print the initial generation prompt for a target.
    Prompt {
        #[arg(short, long)]
        target: String,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_codes::FAILED);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    dotenvy::dotenv().ok();
    let cfg = load_config(&cli.config)?;
    match cli.command {
        Command::Run { target } => cmd_run(&cfg, &target),
        Command::Check { target, parser } => cmd_check(&cfg, &target, parser),
        Command::Prompt { target } => cmd_prompt(&cfg, &target),
    }
}

fn reader(cfg: &AgentConfig) -> PdfplumberReader {
    PdfplumberReader::new(
        cfg.python.clone(),
        cfg.extraction_timeout(),
        cfg.output_limit_bytes,
    )
}

fn sandbox(cfg: &AgentConfig) -> PythonSandbox {
    PythonSandbox::new(
        cfg.python.clone(),
        cfg.execution_timeout(),
        cfg.output_limit_bytes,
    )
}

fn cmd_run(cfg: &AgentConfig, target: &str) -> Result<i32> {
    let inputs = resolve_inputs(&cfg.data_dir, target)?;
    let generator = build_generator(&cfg.generator, cfg.output_limit_bytes)?;

    println!("Target: {target}");
    println!("PDF: {}", inputs.pdf_path.display());
    println!("CSV: {}", inputs.csv_path.display());

    let agent = Agent::new(
        reader(cfg),
        generator,
        sandbox(cfg),
        PromptBuilder::new(cfg.prompt_budget_bytes),
        ArtifactStore::new(&cfg.parsers_dir),
    );
    let mut ctx = RunContext::new(target, inputs.pdf_path, inputs.csv_path, cfg.max_attempts);
    let started = Instant::now();
    let outcome = agent.run(&mut ctx, print_event);

    let report = RunReport::from_outcome(&outcome, started.elapsed());
    match write_report(&cfg.reports_dir, &report) {
        Ok(path) => println!("Report: {}", path.display()),
        Err(err) => eprintln!("warning: {:#}", err.context("write run report")),
    }

    print_summary(&outcome);
    Ok(if outcome.success {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn print_event(event: &LoopEvent) {
    match event {
        LoopEvent::Analyzed { tables, pages } => {
            println!("Analyzed PDF: {tables} table(s) on {pages} page(s)");
        }
        LoopEvent::Generated { attempt, repair } => {
            let verb = if *repair { "Repaired" } else { "Generated" };
            println!("{verb} parser (attempt {attempt})");
        }
        LoopEvent::Validated {
            attempt,
            max_attempts,
            result,
        } => match &result.error {
            None => println!("Validation {attempt}/{max_attempts}: passed"),
            Some(error) => println!("Validation {attempt}/{max_attempts}: failed: {error}"),
        },
        LoopEvent::Repairing {
            attempt,
            max_attempts,
        } => println!("Fixing parser ({attempt}/{max_attempts} attempts used)"),
    }
}

fn print_summary(outcome: &LoopOutcome) {
    match &outcome.stop {
        LoopStop::Success { artifact_path } => {
            println!("Success: parser saved to {}", artifact_path.display());
        }
        LoopStop::Exhausted { attempts } => {
            println!("Failed: no matching parser after {attempts} attempt(s)");
        }
        LoopStop::Failed { error, .. } => println!("Failed: {error}"),
    }
    if !outcome.success && !outcome.error_messages.is_empty() {
        println!("Errors:");
        for error in &outcome.error_messages {
            println!("- {error}");
        }
    }
}

fn cmd_check(cfg: &AgentConfig, target: &str, parser: Option<PathBuf>) -> Result<i32> {
    let inputs = resolve_inputs(&cfg.data_dir, target)?;
    let (parser, code) = match parser {
        Some(path) => {
            let code = std::fs::read_to_string(&path)
                .with_context(|| format!("read parser {}", path.display()))?;
            (path, code)
        }
        None => {
            let store = ArtifactStore::new(&cfg.parsers_dir);
            (store.path_for(target), store.load(target)?)
        }
    };

    let result = validate_parser(&sandbox(cfg), &code, &inputs.pdf_path, &inputs.csv_path);
    match result.error {
        None => {
            println!("OK: {} matches {}", parser.display(), inputs.csv_path.display());
            Ok(exit_codes::OK)
        }
        Some(error) => {
            println!("FAILED: {error}");
            Ok(exit_codes::FAILED)
        }
    }
}

fn cmd_prompt(cfg: &AgentConfig, target: &str) -> Result<i32> {
    let inputs = resolve_inputs(&cfg.data_dir, target)?;
    let structure = extract_structure(&reader(cfg), &inputs.pdf_path, &inputs.csv_path)?;
    let pack = PromptBuilder::new(cfg.prompt_budget_bytes).build_generate(&structure)?;
    println!("{}", pack.as_str());
    Ok(exit_codes::OK)
}
