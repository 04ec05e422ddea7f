//! Loop-level scenarios driven through the public API with scripted
//! collaborators: repair cycles, exhaustion, reports and re-runs.

use std::fs;
use std::time::Duration;

use agent::core::table::Table;
use agent::core::types::{FailureKind, RunContext};
use agent::io::artifact::ArtifactStore;
use agent::io::prompt::PromptBuilder;
use agent::io::report::{RunReport, write_report};
use agent::io::sandbox::SandboxOutcome;
use agent::looping::{Agent, LoopEvent, LoopStop};
use agent::test_support::{
    ScriptedGenerator, ScriptedSandbox, StaticDocumentReader, statement_columns,
    statement_records, statement_table, write_statement_csv,
};

struct Workspace {
    temp: tempfile::TempDir,
}

impl Workspace {
    fn new(rows: usize) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("data/icici");
        fs::create_dir_all(&dir).expect("mkdir");
        write_statement_csv(&dir, rows);
        fs::write(dir.join("icici sample.pdf"), b"%PDF-1.4").expect("write pdf");
        Self { temp }
    }

    fn context(&self) -> RunContext {
        let dir = self.temp.path().join("data/icici");
        RunContext::new("icici", dir.join("icici sample.pdf"), dir.join("result.csv"), 3)
    }

    fn store(&self) -> ArtifactStore {
        ArtifactStore::new(self.temp.path().join("custom_parsers"))
    }
}

/// Candidate 1 returns 95 of 100 rows, candidate 2 renames a column,
/// candidate 3 matches. The run succeeds on the third validation with two
/// recorded errors, and each repair prompt carries the previous error.
#[test]
fn repairs_until_match_on_last_attempt() {
    let ws = Workspace::new(100);
    let mut renamed = statement_columns();
    renamed[1] = "Desc".to_string();
    let agent = Agent::new(
        StaticDocumentReader::with_pages(3),
        ScriptedGenerator::with_code(&["rows95", "renamed", "correct"]),
        ScriptedSandbox::new(vec![
            Ok(SandboxOutcome::Table(statement_table(95))),
            Ok(SandboxOutcome::Table(Table::infer(renamed, &statement_records(100)))),
            Ok(SandboxOutcome::Table(statement_table(100))),
        ]),
        PromptBuilder::new(200_000),
        ws.store(),
    );

    let mut ctx = ws.context();
    let mut events = Vec::new();
    let outcome = agent.run(&mut ctx, |event| events.push(event.clone()));

    assert!(outcome.success);
    assert_eq!(outcome.attempt_count, 2);
    assert_eq!(outcome.error_messages.len(), 2);
    assert!(outcome.error_messages[0].contains("Expected 100 rows, got 95 rows"));
    assert!(outcome.error_messages[1].contains("Column mismatch."));

    let prompts = agent.generator().prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[1].contains("Expected 100 rows, got 95 rows"));
    assert!(prompts[1].contains("rows95"));
    assert!(prompts[2].contains("Column mismatch."));
    assert!(prompts[2].contains("renamed"));

    assert_eq!(
        fs::read_to_string(ws.store().path_for("icici")).expect("read parser"),
        "correct\n"
    );
    let repairs = events
        .iter()
        .filter(|event| matches!(event, LoopEvent::Repairing { .. }))
        .count();
    assert_eq!(repairs, 2);
}

/// Three failures of every kind exhaust the run with exactly three errors,
/// no saved parser, and a report that records the exhaustion.
#[test]
fn exhausted_run_is_reported() {
    let ws = Workspace::new(10);
    let agent = Agent::new(
        StaticDocumentReader::with_pages(1),
        ScriptedGenerator::with_code(&["a", "b", "c"]),
        ScriptedSandbox::new(vec![
            Ok(SandboxOutcome::Raised("SyntaxError: invalid syntax (line 1)".into())),
            Ok(SandboxOutcome::MissingEntryPoint),
            Ok(SandboxOutcome::Table(statement_table(3))),
        ]),
        PromptBuilder::new(200_000),
        ws.store(),
    );

    let mut ctx = ws.context();
    let outcome = agent.run(&mut ctx, |_| {});

    assert!(!outcome.success);
    assert_eq!(outcome.stop, LoopStop::Exhausted { attempts: 3 });
    assert_eq!(ctx.attempt_count, ctx.max_attempts);
    assert_eq!(outcome.error_messages.len(), 3);
    assert_eq!(
        ctx.last_validation.as_ref().and_then(|result| result.kind),
        Some(FailureKind::Mismatch)
    );
    assert!(!ws.store().path_for("icici").exists());

    let reports = ws.temp.path().join(".agent/reports");
    let path = write_report(
        &reports,
        &RunReport::from_outcome(&outcome, Duration::from_millis(42)),
    )
    .expect("write report");
    let contents = fs::read_to_string(&path).expect("read report");
    let report: RunReport = serde_json::from_str(&contents).expect("parse report");
    assert_eq!(report.attempts, 3);
    assert_eq!(report.errors, outcome.error_messages);
    assert_eq!(report.stop, LoopStop::Exhausted { attempts: 3 });
}

/// A second successful run for the same target replaces the first parser.
#[test]
fn rerun_overwrites_saved_parser() {
    let ws = Workspace::new(4);
    for code in ["first", "second"] {
        let agent = Agent::new(
            StaticDocumentReader::with_pages(1),
            ScriptedGenerator::with_code(&[code]),
            ScriptedSandbox::new(vec![Ok(SandboxOutcome::Table(statement_table(4)))]),
            PromptBuilder::new(200_000),
            ws.store(),
        );
        let outcome = agent.run(&mut ws.context(), |_| {});
        assert!(outcome.success);
    }

    assert_eq!(ws.store().load("icici").expect("load"), "second\n");
}
