// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends training metrics to results/metrics.csv.
//
// Rows are written every `logging_steps` optimiser steps with the
// mean training loss over the window, and once per epoch with the
// validation loss when a validation split exists.
//
// Example CSV output:
//   step,epoch,split,loss,learning_rate
//   10,1,train,4.812300,0.000200
//   20,1,train,4.101900,0.000200
//   23,1,val,3.998100,0.000200
//
// How to read it:
//   - train loss should fall over the first epochs
//   - val loss rising while train loss falls → overfitting,
//     fewer epochs or a larger dataset is needed

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const METRICS_FILE: &str = "metrics.csv";
const HEADER: &str = "step,epoch,split,loss,learning_rate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Val => write!(f, "val"),
        }
    }
}

/// One row of the metrics CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Global optimiser step (starts at 1)
    pub step:  usize,
    pub epoch: usize,
    pub split: Split,
    /// Mean cross-entropy over response tokens
    pub loss:  f64,
    pub learning_rate: f64,
}

impl StepMetrics {
    pub fn new(step: usize, epoch: usize, split: Split, loss: f64, learning_rate: f64) -> Self {
        Self { step, epoch, split, loss, learning_rate }
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so reruns
    /// into the same results directory append.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join(METRICS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{},{:.6},{:.6}",
            m.step, m.epoch, m.split, m.loss, m.learning_rate,
        )?;

        tracing::debug!("Logged step {} {} loss={:.4}", m.step, m.split, m.loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let dir = tempfile::tempdir().unwrap();

        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&StepMetrics::new(10, 1, Split::Train, 4.5, 2e-4)).unwrap();

        // A second logger on the same directory must not rewrite the header.
        let again = MetricsLogger::new(dir.path()).unwrap();
        again.log(&StepMetrics::new(12, 1, Split::Val, 4.25, 2e-4)).unwrap();

        let body = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines, vec![
            HEADER,
            "10,1,train,4.500000,0.000200",
            "12,1,val,4.250000,0.000200",
        ]);
    }
}
