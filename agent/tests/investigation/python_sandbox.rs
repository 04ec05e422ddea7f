//! Real `PythonSandbox` runs against small candidate parsers.
//!
//! The candidates ignore the PDF contents, so any existing file works as the
//! document. Validation goes through the same path as `agent run`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use agent::core::types::FailureKind;
use agent::io::document::{DocumentReader, PdfplumberReader};
use agent::io::sandbox::{PythonSandbox, Sandbox, SandboxOutcome};
use agent::test_support::write_statement_csv;
use agent::validate::{MISSING_ENTRY_POINT, validate_parser};
use tempfile::TempDir;

const OUTPUT_LIMIT: usize = 1_000_000;

fn sandbox(timeout: Duration) -> PythonSandbox {
    PythonSandbox::new("python3", timeout, OUTPUT_LIMIT)
}

fn inputs(rows: usize) -> (TempDir, PathBuf, PathBuf) {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = write_statement_csv(temp.path(), rows);
    let pdf = temp.path().join("sample.pdf");
    fs::write(&pdf, b"%PDF-1.4").expect("write pdf");
    (temp, pdf, csv)
}

/// A parser that rebuilds the reference rows the way `write_statement_csv` does.
fn statement_parser(rows: usize) -> String {
    format!(
        r#"
import numpy as np
import pandas as pd


def parse(pdf_path):
    records = []
    for i in range({rows}):
        amount = 100 + i + 0.5
        debit = amount if i % 2 == 0 else np.nan
        credit = np.nan if i % 2 == 0 else amount
        date = "%02d-%02d-2024" % (i % 28 + 1, i // 28 % 12 + 1)
        records.append([date, "Transaction %d" % i, debit, credit, 5000 + i + 0.25])
    return pd.DataFrame(
        records, columns=["Date", "Description", "Debit Amt", "Credit Amt", "Balance"]
    )
"#
    )
}

#[test]
#[ignore]
fn matching_parser_validates() {
    let (_temp, pdf, csv) = inputs(40);
    let result = validate_parser(
        &sandbox(Duration::from_secs(60)),
        &statement_parser(40),
        &pdf,
        &csv,
    );
    assert!(result.success, "{result:?}");
}

#[test]
#[ignore]
fn short_parser_reports_row_counts() {
    let (_temp, pdf, csv) = inputs(100);
    let result = validate_parser(
        &sandbox(Duration::from_secs(60)),
        &statement_parser(95),
        &pdf,
        &csv,
    );
    assert_eq!(result.kind, Some(FailureKind::Mismatch));
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|error| error.contains("Expected 100 rows, got 95 rows")),
        "{result:?}"
    );
}

#[test]
#[ignore]
fn module_without_parse_is_invalid() {
    let (_temp, pdf, csv) = inputs(3);
    let result = validate_parser(&sandbox(Duration::from_secs(30)), "x = 1\n", &pdf, &csv);
    assert_eq!(result.kind, Some(FailureKind::InvalidArtifact));
    assert_eq!(result.error.as_deref(), Some(MISSING_ENTRY_POINT));
}

#[test]
#[ignore]
fn syntax_error_is_reported_with_line() {
    let (_temp, pdf, _csv) = inputs(3);
    let outcome = sandbox(Duration::from_secs(30))
        .execute("def parse(pdf_path)\n    return 1\n", &pdf)
        .expect("execute");
    let SandboxOutcome::Raised(error) = outcome else {
        panic!("expected raised outcome, got {outcome:?}");
    };
    assert!(error.starts_with("failed to load parser: SyntaxError"), "{error}");
    assert!(error.ends_with("(line 1)"), "{error}");
}

#[test]
#[ignore]
fn raising_parser_is_isolated() {
    let (_temp, pdf, csv) = inputs(3);
    let code = "def parse(pdf_path):\n    raise KeyError('Balance')\n";
    let result = validate_parser(&sandbox(Duration::from_secs(30)), code, &pdf, &csv);
    assert_eq!(result.kind, Some(FailureKind::Execution));
    assert_eq!(result.error.as_deref(), Some("KeyError: 'Balance' (line 2)"));
}

#[test]
#[ignore]
fn non_dataframe_result_is_execution_failure() {
    let (_temp, pdf, csv) = inputs(3);
    let code = "def parse(pdf_path):\n    return [1, 2, 3]\n";
    let result = validate_parser(&sandbox(Duration::from_secs(30)), code, &pdf, &csv);
    assert_eq!(result.kind, Some(FailureKind::Execution));
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|error| error.contains("expected pandas.DataFrame")),
        "{result:?}"
    );
}

#[test]
#[ignore]
fn exiting_parser_cannot_skip_the_report() {
    let (_temp, pdf, csv) = inputs(3);
    let code = "import sys\n\ndef parse(pdf_path):\n    sys.exit(3)\n";
    let result = validate_parser(&sandbox(Duration::from_secs(30)), code, &pdf, &csv);
    assert_eq!(result.kind, Some(FailureKind::Execution));
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|error| error.starts_with("SystemExit")),
        "{result:?}"
    );
}

#[test]
#[ignore]
fn slow_parser_times_out() {
    let (_temp, pdf, csv) = inputs(3);
    let code = "import time\n\ndef parse(pdf_path):\n    time.sleep(30)\n";
    let result = validate_parser(&sandbox(Duration::from_secs(2)), code, &pdf, &csv);
    assert_eq!(result.kind, Some(FailureKind::Execution));
    assert_eq!(
        result.error.as_deref(),
        Some("parse did not finish within 2s")
    );
}

#[test]
#[ignore]
fn integer_index_counts_as_default() {
    let (_temp, pdf, csv) = inputs(10);
    let code = format!(
        "{}\n\n_build = parse\n\n\ndef parse(pdf_path):\n    df = _build(pdf_path)\n    df.index = pd.Index(list(range(len(df))), dtype=\"int64\")\n    return df\n",
        statement_parser(10)
    );
    let result = validate_parser(&sandbox(Duration::from_secs(60)), &code, &pdf, &csv);
    assert!(result.success, "{result:?}");
}

#[test]
#[ignore]
fn timeout_reaches_processes_the_parser_spawned() {
    let (_temp, pdf, csv) = inputs(3);
    let code = "import subprocess\n\ndef parse(pdf_path):\n    subprocess.Popen(['sleep', '60'])\n    subprocess.run(['sleep', '60'])\n";
    let started = std::time::Instant::now();
    let result = validate_parser(&sandbox(Duration::from_secs(2)), code, &pdf, &csv);
    assert_eq!(
        result.error.as_deref(),
        Some("parse did not finish within 2s")
    );
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[test]
#[ignore]
fn document_helper_rejects_non_pdf() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("broken.pdf");
    fs::write(&path, b"not a pdf").expect("write");

    let reader = PdfplumberReader::new("python3", Duration::from_secs(60), OUTPUT_LIMIT);
    let err = reader.read(&path).unwrap_err();
    assert!(
        err.to_string().contains("document helper exited with status"),
        "{err:#}"
    );
}
