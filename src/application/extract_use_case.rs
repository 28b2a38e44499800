// ============================================================
// Layer 2 — ExtractUseCase
// ============================================================
// PDFs → cleaned plain text, one <stem>.txt per document:
//
//   Step 1: Load documents        (Layer 4 - PdfLoader)
//   Step 2: Clean the text        (Layer 4 - Preprocessor)
//   Step 3: Write <out>/<stem>.txt
//
// The text files are the hand-off to `curate` and are meant to be
// readable, so a human can check what the extractor produced.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::data::{loader::PdfLoader, preprocessor::Preprocessor};
use crate::domain::traits::DocumentSource;

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub input_dir:  PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractSummary {
    pub documents:  usize,
    pub pages:      usize,
    pub characters: usize,
    pub written:    Vec<PathBuf>,
}

pub struct ExtractUseCase {
    config: ExtractConfig,
}

impl ExtractUseCase {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ExtractSummary> {
        tracing::info!("Extracting PDFs from '{}'", self.config.input_dir.display());
        self.execute_with(&PdfLoader::new(&self.config.input_dir))
    }

    pub fn execute_with(&self, source: &impl DocumentSource) -> Result<ExtractSummary> {
        let docs = source.load_all()?;
        if docs.is_empty() {
            tracing::warn!("No documents found in '{}'", self.config.input_dir.display());
        }

        let out = &self.config.output_dir;
        fs::create_dir_all(out).with_context(|| format!("Cannot create '{}'", out.display()))?;

        let preprocessor = Preprocessor::new();
        let mut summary = ExtractSummary::default();
        for doc in &docs {
            let text = preprocessor.clean(&doc.text);
            if text.is_empty() {
                tracing::warn!("'{}' has no extractable text (scanned images?)", doc.source);
            }

            let path = out.join(format!("{}.txt", doc.stem()));
            fs::write(&path, format!("{text}\n"))
                .with_context(|| format!("Cannot write '{}'", path.display()))?;
            tracing::debug!("'{}' → '{}'", doc.source, path.display());

            summary.documents += 1;
            summary.pages += doc.pages;
            summary.characters += text.chars().count();
            summary.written.push(path);
        }

        tracing::info!("Extracted {} documents", summary.documents);
        Ok(summary)
    }
}
