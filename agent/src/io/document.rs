//! Source document reader.
//!
//! The [`DocumentReader`] trait decouples extraction from the backend that
//! actually understands PDFs. The default backend drives pdfplumber through a
//! small Python helper; tests use static readers that return fixed structures.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::structure::DocumentStructure;
use crate::io::process::run_with_timeout;

const EXTRACT_HELPER: &str = include_str!("helpers/extract_structure.py");

/// Abstraction over document extraction backends.
pub trait DocumentReader {
    /// Read tables and per-page text from the document at `path`.
    fn read(&self, path: &Path) -> Result<DocumentStructure>;
}

/// Reads PDFs with pdfplumber in a child Python process.
#[derive(Debug, Clone)]
pub struct PdfplumberReader {
    python: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl PdfplumberReader {
    pub fn new(python: impl Into<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            python: python.into(),
            timeout,
            output_limit_bytes,
        }
    }
}

impl DocumentReader for PdfplumberReader {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn read(&self, path: &Path) -> Result<DocumentStructure> {
        if !path.is_file() {
            return Err(anyhow!("document not found: {}", path.display()));
        }
        let workdir = tempfile::tempdir().context("create extraction dir")?;
        let helper_path = workdir.path().join("extract_structure.py");
        let output_path = workdir.path().join("structure.json");
        fs::write(&helper_path, EXTRACT_HELPER)
            .with_context(|| format!("write {}", helper_path.display()))?;

        let mut cmd = Command::new(&self.python);
        cmd.arg(&helper_path).arg(path).arg(&output_path);
        let output = run_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)
            .context("run document helper")?;

        if output.timed_out {
            return Err(anyhow!(
                "document helper timed out after {}s",
                self.timeout.as_secs()
            ));
        }
        if !output.status.success() {
            return Err(anyhow!(output.failure_summary("document helper")));
        }

        let structure = load_structure(&output_path)?;
        debug!(
            tables = structure.tables.len(),
            pages = structure.text_blocks.len(),
            "document read"
        );
        Ok(structure)
    }
}

fn load_structure(path: &Path) -> Result<DocumentStructure> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
