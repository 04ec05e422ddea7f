//! Execution boundary for generated parsers.
//!
//! A candidate is untrusted code. [`PythonSandbox`] writes it into a fresh
//! temporary directory and runs it in a new interpreter through a helper that
//! loads the module, calls `parse(pdf_path)` and writes a JSON report. Nothing
//! but that report crosses back into the agent.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::table::{Cell, Table};
use crate::io::process::run_with_timeout;

const RUN_PARSER_HELPER: &str = include_str!("helpers/run_parser.py");
const PARSER_FILE: &str = "candidate_parser.py";

/// What happened when a candidate was executed.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxOutcome {
    /// `parse` returned a DataFrame.
    Table(Table),
    /// The module loaded but defines no callable `parse`.
    MissingEntryPoint,
    /// Loading or calling the candidate failed; the message describes why.
    Raised(String),
}

/// Abstraction over candidate execution backends.
pub trait Sandbox {
    /// Run `code`'s entry point against `document`.
    ///
    /// `Err` means the sandbox itself could not produce a verdict (for example
    /// the interpreter could not be spawned or died without a report).
    fn execute(&self, code: &str, document: &Path) -> Result<SandboxOutcome>;
}

/// Runs candidates in a throwaway Python process.
#[derive(Debug, Clone)]
pub struct PythonSandbox {
    python: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl PythonSandbox {
    pub fn new(python: impl Into<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            python: python.into(),
            timeout,
            output_limit_bytes,
        }
    }
}

impl Sandbox for PythonSandbox {
    #[instrument(skip_all, fields(document = %document.display(), code_bytes = code.len()))]
    fn execute(&self, code: &str, document: &Path) -> Result<SandboxOutcome> {
        let workdir = tempfile::tempdir().context("create sandbox dir")?;
        let parser_path = workdir.path().join(PARSER_FILE);
        let helper_path = workdir.path().join("run_parser.py");
        let report_path = workdir.path().join("report.json");
        fs::write(&parser_path, code)
            .with_context(|| format!("write {}", parser_path.display()))?;
        fs::write(&helper_path, RUN_PARSER_HELPER)
            .with_context(|| format!("write {}", helper_path.display()))?;

        // The candidate runs in the caller's working directory, so pass an
        // absolute document path in case it resolves relative paths itself.
        let document = document
            .canonicalize()
            .with_context(|| format!("resolve {}", document.display()))?;

        let mut cmd = Command::new(&self.python);
        cmd.arg(&helper_path)
            .arg(&parser_path)
            .arg(&document)
            .arg(&report_path);
        let output = run_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)
            .context("run candidate parser")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "candidate parser timed out");
            return Ok(SandboxOutcome::Raised(format!(
                "parse did not finish within {}s",
                self.timeout.as_secs()
            )));
        }
        if !report_path.exists() {
            return Err(anyhow!(output.failure_summary("parser process")));
        }

        let contents = fs::read_to_string(&report_path)
            .with_context(|| format!("read {}", report_path.display()))?;
        let outcome = decode_report(&contents)?;
        debug!(outcome = outcome_label(&outcome), "candidate executed");
        Ok(outcome)
    }
}

fn outcome_label(outcome: &SandboxOutcome) -> &'static str {
    match outcome {
        SandboxOutcome::Table(_) => "table",
        SandboxOutcome::MissingEntryPoint => "missing_entry_point",
        SandboxOutcome::Raised(_) => "raised",
    }
}

/// Report written by `run_parser.py`.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum HelperReport {
    Ok {
        table: WireTable,
    },
    MissingEntryPoint,
    Error {
        stage: String,
        error: String,
        #[serde(default)]
        line: Option<u32>,
    },
}

#[derive(Debug, Deserialize)]
struct WireTable {
    columns: Vec<String>,
    dtypes: Vec<String>,
    default_index: bool,
    rows: Vec<Vec<Value>>,
}

impl From<WireTable> for Table {
    fn from(wire: WireTable) -> Self {
        Table {
            columns: wire.columns,
            dtypes: wire.dtypes,
            default_index: wire.default_index,
            rows: wire
                .rows
                .iter()
                .map(|row| row.iter().map(Cell::from_json).collect())
                .collect(),
        }
    }
}

fn decode_report(contents: &str) -> Result<SandboxOutcome> {
    let report: HelperReport =
        serde_json::from_str(contents).context("parse parser helper report")?;
    Ok(match report {
        HelperReport::Ok { table } => SandboxOutcome::Table(table.into()),
        HelperReport::MissingEntryPoint => SandboxOutcome::MissingEntryPoint,
        HelperReport::Error { stage, error, line } => {
            let mut message = match stage.as_str() {
                "load" => format!("failed to load parser: {error}"),
                "setup" => format!("parser environment is broken: {error}"),
                _ => error,
            };
            if let Some(line) = line {
                message.push_str(&format!(" (line {line})"));
            }
            SandboxOutcome::Raised(message)
        }
    })
}
