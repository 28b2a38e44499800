// ============================================================
// Layer 2 — ValidateUseCase
// ============================================================
// Checks every line of a dataset file and returns the report.
// The CLI prints it and turns a failing report into a non-zero
// exit, so the check can gate `train` in a script.

use anyhow::Result;
use std::path::PathBuf;

use crate::data::jsonl::{scan, ValidationReport};

pub struct ValidateUseCase {
    path: PathBuf,
}

impl ValidateUseCase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn execute(&self) -> Result<ValidationReport> {
        let report = scan(&self.path)?;
        tracing::info!(
            "'{}': {} lines, {} valid, {} issues",
            self.path.display(), report.total, report.valid, report.issues.len()
        );
        Ok(report)
    }
}
