//! Validation: run a candidate against the sample document and compare its
//! table with the reference table.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::core::table::compare_tables;
use crate::core::types::{FailureKind, ValidationResult};
use crate::io::reference::read_reference_table;
use crate::io::sandbox::{Sandbox, SandboxOutcome};

pub const MISSING_ENTRY_POINT: &str = "parse function not found in generated code";

/// Validate `code` against the inputs. Never fails; every failure mode is a
/// [`ValidationResult`].
#[instrument(skip_all, fields(pdf = %pdf_path.display(), csv = %csv_path.display()))]
pub fn validate_parser<S: Sandbox + ?Sized>(
    sandbox: &S,
    code: &str,
    pdf_path: &Path,
    csv_path: &Path,
) -> ValidationResult {
    let produced = match sandbox.execute(code, pdf_path) {
        Ok(SandboxOutcome::Table(table)) => table,
        Ok(SandboxOutcome::MissingEntryPoint) => {
            return ValidationResult::failed(FailureKind::InvalidArtifact, MISSING_ENTRY_POINT);
        }
        Ok(SandboxOutcome::Raised(error)) => {
            return ValidationResult::failed(FailureKind::Execution, error);
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "sandbox failed");
            return ValidationResult::failed(FailureKind::Execution, format!("{err:#}"));
        }
    };

    // Read fresh on every validation so edits to the CSV are picked up.
    let expected = match read_reference_table(csv_path) {
        Ok(table) => table,
        Err(err) => {
            return ValidationResult::failed(
                FailureKind::Execution,
                format!("load reference table: {err:#}"),
            );
        }
    };

    match compare_tables(&expected, &produced) {
        None => {
            info!(rows = produced.row_count(), "parser output matches reference");
            ValidationResult::passed()
        }
        Some(diff) => ValidationResult::failed(FailureKind::Mismatch, diff.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::Table;
    use crate::test_support::{
        ScriptedSandbox, statement_columns, statement_records, statement_table,
        write_statement_csv,
    };

    struct Fixture {
        _temp: tempfile::TempDir,
        pdf: std::path::PathBuf,
        csv: std::path::PathBuf,
    }

    fn fixture(rows: usize) -> Fixture {
        let temp = tempfile::tempdir().expect("tempdir");
        let csv = write_statement_csv(temp.path(), rows);
        let pdf = temp.path().join("icici sample.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").expect("write pdf");
        Fixture {
            _temp: temp,
            pdf,
            csv,
        }
    }

    #[test]
    fn matching_table_passes() {
        let fx = fixture(100);
        let sandbox = ScriptedSandbox::new(vec![Ok(SandboxOutcome::Table(statement_table(100)))]);
        let result = validate_parser(&sandbox, "code", &fx.pdf, &fx.csv);
        assert_eq!(result, ValidationResult::passed());
    }

    #[test]
    fn short_table_reports_row_counts() {
        let fx = fixture(100);
        let sandbox = ScriptedSandbox::new(vec![Ok(SandboxOutcome::Table(statement_table(95)))]);
        let result = validate_parser(&sandbox, "code", &fx.pdf, &fx.csv);

        assert!(!result.success);
        assert_eq!(result.kind, Some(FailureKind::Mismatch));
        let error = result.error.expect("error");
        assert!(error.contains("Expected 100 rows, got 95 rows"), "{error}");
    }

    #[test]
    fn renamed_column_is_a_column_mismatch() {
        let fx = fixture(100);
        let mut columns = statement_columns();
        columns[1] = "Desc".to_string();
        let produced = Table::infer(columns, &statement_records(100));
        let sandbox = ScriptedSandbox::new(vec![Ok(SandboxOutcome::Table(produced))]);

        let error = validate_parser(&sandbox, "code", &fx.pdf, &fx.csv)
            .error
            .expect("error");
        assert!(error.starts_with("Column mismatch."), "{error}");
        assert!(error.contains("'Desc'"));
        assert!(!error.contains("rows"));
    }

    #[test]
    fn reordered_columns_fail() {
        let fx = fixture(5);
        let mut produced = statement_table(5);
        produced.columns.swap(0, 1);
        for row in &mut produced.rows {
            row.swap(0, 1);
        }
        produced.dtypes.swap(0, 1);
        let sandbox = ScriptedSandbox::new(vec![Ok(SandboxOutcome::Table(produced))]);

        let result = validate_parser(&sandbox, "code", &fx.pdf, &fx.csv);
        assert_eq!(result.kind, Some(FailureKind::Mismatch));
        assert!(result.error.expect("error").starts_with("Column mismatch."));
    }

    #[test]
    fn wrong_dtype_is_reported() {
        let fx = fixture(5);
        let mut produced = statement_table(5);
        produced.dtypes[4] = "object".to_string();
        let sandbox = ScriptedSandbox::new(vec![Ok(SandboxOutcome::Table(produced))]);

        let error = validate_parser(&sandbox, "code", &fx.pdf, &fx.csv)
            .error
            .expect("error");
        assert!(
            error.ends_with("column 'Balance' has dtype object, expected float64"),
            "{error}"
        );
    }

    #[test]
    fn missing_parse_is_invalid_artifact() {
        let fx = fixture(3);
        let sandbox = ScriptedSandbox::new(vec![Ok(SandboxOutcome::MissingEntryPoint)]);
        let result = validate_parser(&sandbox, "x = 1", &fx.pdf, &fx.csv);
        assert_eq!(
            result,
            ValidationResult::failed(FailureKind::InvalidArtifact, MISSING_ENTRY_POINT)
        );
    }

    #[test]
    fn raising_parser_is_execution_failure() {
        let fx = fixture(3);
        let sandbox = ScriptedSandbox::new(vec![Ok(SandboxOutcome::Raised(
            "KeyError: 'Balance' (line 14)".to_string(),
        ))]);
        let result = validate_parser(&sandbox, "code", &fx.pdf, &fx.csv);
        assert_eq!(result.kind, Some(FailureKind::Execution));
        assert_eq!(result.error.as_deref(), Some("KeyError: 'Balance' (line 14)"));
    }

    #[test]
    fn sandbox_error_is_execution_failure() {
        let fx = fixture(3);
        let sandbox = ScriptedSandbox::new(vec![Err(
            "parser process exited with status 139: Segmentation fault".to_string(),
        )]);
        let result = validate_parser(&sandbox, "code", &fx.pdf, &fx.csv);
        assert_eq!(result.kind, Some(FailureKind::Execution));
        assert!(result.error.expect("error").contains("status 139"));
    }

    #[test]
    fn unreadable_reference_is_execution_failure() {
        let fx = fixture(3);
        let sandbox = ScriptedSandbox::new(vec![Ok(SandboxOutcome::Table(statement_table(3)))]);
        let result = validate_parser(&sandbox, "code", &fx.pdf, &fx.pdf.with_extension("csv"));
        assert_eq!(result.kind, Some(FailureKind::Execution));
        assert!(
            result
                .error
                .expect("error")
                .starts_with("load reference table: reference table not found")
        );
    }

    #[test]
    fn revalidation_is_stable() {
        let fx = fixture(10);
        let sandbox = ScriptedSandbox::new(vec![
            Ok(SandboxOutcome::Table(statement_table(9))),
            Ok(SandboxOutcome::Table(statement_table(9))),
        ]);
        let first = validate_parser(&sandbox, "code", &fx.pdf, &fx.csv);
        let second = validate_parser(&sandbox, "code", &fx.pdf, &fx.csv);
        assert_eq!(first, second);
    }
}
