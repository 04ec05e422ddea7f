//! Stage errors that end a run.
//!
//! Validation failures are not errors (see [`crate::core::types::ValidationResult`]);
//! only the stages the repair cycle cannot recover from produce these.

use thiserror::Error;

/// The sample document or reference table could not be read.
#[derive(Debug, Error)]
#[error("{0:#}")]
pub struct ExtractionError(pub anyhow::Error);

/// The text-generation service failed or returned nothing usable.
#[derive(Debug, Error)]
#[error("{0:#}")]
pub struct GenerationError(pub anyhow::Error);
