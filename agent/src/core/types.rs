//! Shared types for the generate → validate → repair loop.
//!
//! These types define the contract between the controller and its steps. They
//! hold no I/O handles and can be built freely in tests.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::structure::StructuralDescription;

/// Attempt ceiling used when the config does not override it.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Why a validation failed. Every kind is eligible for repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The artifact loaded but does not define `parse`.
    InvalidArtifact,
    /// The artifact raised, timed out, or its interpreter died.
    Execution,
    /// The produced table differs from the reference.
    Mismatch,
}

/// Structured validator verdict. Validation never fails with an error; all
/// failure modes end up here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub error: Option<String>,
    pub kind: Option<FailureKind>,
}

impl ValidationResult {
    pub fn passed() -> Self {
        Self {
            success: true,
            error: None,
            kind: None,
        }
    }

    pub fn failed(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            kind: Some(kind),
        }
    }
}

/// Where the controller goes after a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Repair the parser and validate again.
    Continue,
    /// The latest validation passed.
    Success,
    /// Validation failed and the attempt budget is spent.
    Exhausted,
}

/// Mutable record threaded through one run. Owned by the controller.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub target: String,
    pub pdf_path: PathBuf,
    pub csv_path: PathBuf,
    /// Empty until extraction succeeds.
    pub structure: StructuralDescription,
    /// Latest candidate only; earlier versions are not kept.
    pub parser_code: String,
    pub last_validation: Option<ValidationResult>,
    /// Failed validations so far. Never exceeds `max_attempts`.
    pub attempt_count: u32,
    pub max_attempts: u32,
    /// Append-only.
    pub error_messages: Vec<String>,
    pub success: bool,
}

impl RunContext {
    pub fn new(
        target: impl Into<String>,
        pdf_path: impl Into<PathBuf>,
        csv_path: impl Into<PathBuf>,
        max_attempts: u32,
    ) -> Self {
        Self {
            target: target.into(),
            pdf_path: pdf_path.into(),
            csv_path: csv_path.into(),
            structure: StructuralDescription::default(),
            parser_code: String::new(),
            last_validation: None,
            attempt_count: 0,
            max_attempts,
            error_messages: Vec::new(),
            success: false,
        }
    }

    /// Record a step failure that ends the run.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.success = false;
        self.error_messages.push(message.into());
    }

    /// Apply a validation verdict: success mirrors the verdict, and a failure
    /// counts one attempt and appends its error.
    pub fn record_validation(&mut self, result: ValidationResult) {
        self.success = result.success;
        if !result.success {
            if self.attempt_count < self.max_attempts {
                self.attempt_count += 1;
            }
            let error = result.error.as_deref().unwrap_or("validation failed");
            self.error_messages.push(format!(
                "attempt {}/{}: {}",
                self.attempt_count, self.max_attempts, error
            ));
        }
        self.last_validation = Some(result);
    }

    /// Error from the latest validation, if it failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_validation
            .as_ref()
            .filter(|result| !result.success)
            .and_then(|result| result.error.as_deref())
    }
}
