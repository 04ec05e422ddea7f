//! Structure extraction: sample document plus reference table → generation context.

use std::path::Path;

use anyhow::Context;
use tracing::{info, instrument};

use crate::core::structure::StructuralDescription;
use crate::error::ExtractionError;
use crate::io::document::DocumentReader;
use crate::io::reference::summarize_reference;

/// Read the document's tables and text and summarize the reference table.
///
/// The reference table is read before the document so that a bad CSV fails
/// without spawning the document helper.
#[instrument(skip_all, fields(pdf = %pdf_path.display(), csv = %csv_path.display()))]
pub fn extract_structure<D: DocumentReader + ?Sized>(
    reader: &D,
    pdf_path: &Path,
    csv_path: &Path,
) -> Result<StructuralDescription, ExtractionError> {
    let expected = summarize_reference(csv_path)
        .with_context(|| format!("read reference table {}", csv_path.display()))
        .map_err(ExtractionError)?;
    let document = reader
        .read(pdf_path)
        .with_context(|| format!("read document {}", pdf_path.display()))
        .map_err(ExtractionError)?;

    let structure = StructuralDescription::new(document, expected);
    info!(
        tables = structure.tables.len(),
        pages = structure.page_count(),
        columns = structure.expected_output.columns.len(),
        rows = structure.expected_output.total_rows,
        "structure extracted"
    );
    Ok(structure)
}
