//! Conventional input locations for a target.
//!
//! A target `icici` reads `<data_dir>/icici/icici sample.pdf` and
//! `<data_dir>/icici/result.csv`. When the conventionally named PDF is absent,
//! the first `*.pdf` in the folder (by name) is used instead.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

pub const REFERENCE_FILE: &str = "result.csv";

/// Input paths for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInputs {
    pub pdf_path: PathBuf,
    pub csv_path: PathBuf,
}

pub fn validate_target(target: &str) -> Result<()> {
    if target.is_empty() {
        return Err(anyhow!("target must not be empty"));
    }
    if target == "." || target == ".." {
        return Err(anyhow!("target must not be '{target}'"));
    }
    if target
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'))
    {
        return Err(anyhow!("target must be [A-Za-z0-9._-] only (got '{target}')"));
    }
    Ok(())
}

/// Resolve and check both input files for `target`.
pub fn resolve_inputs(data_dir: &Path, target: &str) -> Result<TargetInputs> {
    validate_target(target)?;
    let dir = data_dir.join(target);
    let conventional = dir.join(format!("{target} sample.pdf"));
    let pdf_path = if conventional.is_file() {
        conventional
    } else {
        first_pdf(&dir)?.unwrap_or(conventional)
    };
    if !pdf_path.is_file() {
        return Err(anyhow!("PDF file not found: {}", pdf_path.display()));
    }
    let csv_path = dir.join(REFERENCE_FILE);
    if !csv_path.is_file() {
        return Err(anyhow!("CSV file not found: {}", csv_path.display()));
    }
    Ok(TargetInputs { pdf_path, csv_path })
}

fn first_pdf(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut pdfs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read dir entry in {}", dir.display()))?
            .path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, b"x").expect("write");
    }

    #[test]
    fn resolves_conventional_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        touch(&temp.path().join("icici/icici sample.pdf"));
        touch(&temp.path().join("icici/aaa.pdf"));
        touch(&temp.path().join("icici/result.csv"));

        let inputs = resolve_inputs(temp.path(), "icici").expect("resolve");
        assert_eq!(inputs.pdf_path, temp.path().join("icici/icici sample.pdf"));
        assert_eq!(inputs.csv_path, temp.path().join("icici/result.csv"));
    }

    #[test]
    fn falls_back_to_first_pdf_by_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        touch(&temp.path().join("sbi/statement-b.PDF"));
        touch(&temp.path().join("sbi/statement-a.pdf"));
        touch(&temp.path().join("sbi/result.csv"));

        let inputs = resolve_inputs(temp.path(), "sbi").expect("resolve");
        assert_eq!(inputs.pdf_path, temp.path().join("sbi/statement-a.pdf"));
    }

    #[test]
    fn missing_inputs_are_named() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = resolve_inputs(temp.path(), "hdfc").unwrap_err();
        assert!(err.to_string().starts_with("PDF file not found:"));

        touch(&temp.path().join("hdfc/hdfc sample.pdf"));
        let err = resolve_inputs(temp.path(), "hdfc").unwrap_err();
        assert!(err.to_string().starts_with("CSV file not found:"));
    }

    #[test]
    fn rejects_path_like_targets() {
        assert!(validate_target("../etc").is_err());
        assert!(validate_target("..").is_err());
        assert!(validate_target("").is_err());
        assert!(validate_target("icici_v2.1").is_ok());
    }
}
