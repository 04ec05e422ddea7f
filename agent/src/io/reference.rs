//! Reference table reader (CSV → [`Table`]).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::structure::ReferenceSummary;
use crate::core::table::Table;

/// Read a reference CSV with pandas-compatible header and dtype handling.
pub fn read_reference_table(path: &Path) -> Result<Table> {
    if !path.is_file() {
        return Err(anyhow!("reference table not found: {}", path.display()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("read header of {}", path.display()))?;
    let columns = normalize_headers(headers.iter());
    if columns.is_empty() {
        return Err(anyhow!("no columns in {}", path.display()));
    }

    let mut records = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("parse row {} of {}", idx + 1, path.display()))?;
        if record.len() > columns.len() {
            return Err(anyhow!(
                "row {} of {} has {} fields, expected {}",
                idx + 1,
                path.display(),
                record.len(),
                columns.len()
            ));
        }
        // Short rows are padded with missing values.
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(columns.len(), String::new());
        records.push(row);
    }

    let table = Table::infer(columns, &records);
    debug!(
        path = %path.display(),
        columns = table.columns.len(),
        rows = table.row_count(),
        "reference table loaded"
    );
    Ok(table)
}

/// Read and summarize a reference CSV for the generation context.
pub fn summarize_reference(path: &Path) -> Result<ReferenceSummary> {
    let table = read_reference_table(path)?;
    Ok(ReferenceSummary::from_table(&table))
}

/// Name headers the way pandas does: blank → `Unnamed: <i>`, repeats → `<name>.<n>`.
fn normalize_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::new();
    for (idx, name) in raw.enumerate() {
        let name = if idx == 0 {
            name.trim_start_matches('\u{feff}')
        } else {
            name
        };
        let base = if name.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            name.to_string()
        };
        let count = seen.entry(base.clone()).or_insert(0);
        let column = if *count == 0 {
            base
        } else {
            format!("{base}.{count}")
        };
        *count += 1;
        columns.push(column);
    }
    columns
}
