//! Structural description of a sample document and its reference table.
//!
//! This is the generation context: it is serialized into prompts as-is, so
//! field names are part of what the model sees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::table::Table;

/// Number of reference rows embedded as samples.
pub const SAMPLE_ROWS: usize = 3;

/// A table found on one page of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    /// Zero-based page index.
    pub page: usize,
    pub header_row: Vec<Option<String>>,
    /// Full row matrix, header row included.
    pub rows: Vec<Vec<Option<String>>>,
}

/// What the document reader returns for a source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub tables: Vec<ExtractedTable>,
    /// Extracted text, one entry per page.
    pub text_blocks: Vec<String>,
}

/// Shape summary of the reference table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSummary {
    pub columns: Vec<String>,
    pub dtypes: BTreeMap<String, String>,
    pub sample_rows: Vec<Map<String, Value>>,
    pub total_rows: usize,
}

impl ReferenceSummary {
    pub fn from_table(table: &Table) -> Self {
        let dtypes = table
            .columns
            .iter()
            .enumerate()
            .map(|(col, name)| (name.clone(), table.dtype(col).to_string()))
            .collect();
        let sample_rows = (0..table.row_count().min(SAMPLE_ROWS))
            .map(|row| {
                table
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(col, name)| (name.clone(), table.cell(row, col).to_json()))
                    .collect()
            })
            .collect();
        Self {
            columns: table.columns.clone(),
            dtypes,
            sample_rows,
            total_rows: table.row_count(),
        }
    }

    /// Dtype for a column, `object` when unknown.
    pub fn dtype_of(&self, column: &str) -> &str {
        self.dtypes.get(column).map(String::as_str).unwrap_or("object")
    }
}

/// Everything the generator needs to know about a target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralDescription {
    pub tables: Vec<ExtractedTable>,
    pub text_blocks: Vec<String>,
    pub expected_output: ReferenceSummary,
}

impl StructuralDescription {
    pub fn new(document: DocumentStructure, expected_output: ReferenceSummary) -> Self {
        Self {
            tables: document.tables,
            text_blocks: document.text_blocks,
            expected_output,
        }
    }

    pub fn page_count(&self) -> usize {
        self.text_blocks.len()
    }
}
