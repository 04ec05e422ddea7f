//! Run reports (`<reports_dir>/<target>.json`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::io::config::write_atomic;
use crate::looping::{LoopOutcome, LoopStop};

/// Outcome of the latest run for a target. Holds no parser code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub target: String,
    pub success: bool,
    pub stop: LoopStop,
    pub attempts: u32,
    pub max_attempts: u32,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn from_outcome(outcome: &LoopOutcome, elapsed: Duration) -> Self {
        Self {
            target: outcome.target.clone(),
            success: outcome.success,
            stop: outcome.stop.clone(),
            attempts: outcome.attempt_count,
            max_attempts: outcome.max_attempts,
            errors: outcome.error_messages.clone(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

pub fn report_path(reports_dir: &Path, target: &str) -> PathBuf {
    reports_dir.join(format!("{target}.json"))
}

/// Write the report atomically, replacing the previous run's report.
pub fn write_report(reports_dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let path = report_path(reports_dir, &report.target);
    let mut buf = serde_json::to_string_pretty(report).context("serialize run report")?;
    buf.push('\n');
    write_atomic(&path, &buf)?;
    Ok(path)
}
