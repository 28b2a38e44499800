// ============================================================
// Layer 2 — CurateUseCase
// ============================================================
// Extracted text → dataset.jsonl:
//
//   Step 1: Load *.txt             (Layer 4 - TextLoader)
//   Step 2: Clean again            (hand-edited text is welcome)
//   Step 3: Curate per document    (Layer 4 - Curator)
//   Step 4: Merge with the existing dataset when appending
//   Step 5: Write JSONL            (Layer 4 - jsonl)
//
// With --append, records already in the dataset are kept as they
// are (they may have been edited by hand) and new records whose
// instruction is already present are skipped.

use anyhow::{ensure, Result};
use std::{collections::HashSet, path::PathBuf};

use crate::data::{
    curator::{Curator, Strategy},
    jsonl::{read_dataset, write_dataset},
    loader::TextLoader,
    preprocessor::Preprocessor,
};
use crate::domain::record::DatasetRecord;
use crate::domain::traits::DocumentSource;

#[derive(Debug, Clone)]
pub struct CurateConfig {
    pub input_dir: PathBuf,
    pub output:    PathBuf,
    pub strategy:  Strategy,
    pub min_words: usize,
    pub max_words: usize,
    pub append:    bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurateSummary {
    pub documents:  usize,
    pub added:      usize,
    pub duplicates: usize,
    pub total:      usize,
}

pub struct CurateUseCase {
    config: CurateConfig,
}

impl CurateUseCase {
    pub fn new(config: CurateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<CurateSummary> {
        let cfg = &self.config;
        ensure!(cfg.max_words > 0, "max_words must be positive");
        ensure!(
            cfg.min_words <= cfg.max_words,
            "min_words ({}) exceeds max_words ({})", cfg.min_words, cfg.max_words
        );

        // ── Step 1-3: Load, clean, curate ─────────────────────────────────────
        tracing::info!("Curating text files in '{}' ({:?})", cfg.input_dir.display(), cfg.strategy);
        let docs = TextLoader::new(&cfg.input_dir).load_all()?;
        let preprocessor = Preprocessor::new();
        let curator = Curator::new(cfg.strategy, cfg.min_words, cfg.max_words);

        let mut fresh = Vec::new();
        for mut doc in docs.iter().cloned() {
            doc.text = preprocessor.clean(&doc.text);
            let records = curator.curate(&doc);
            tracing::debug!("'{}' ({} words) → {} records", doc.source, doc.word_count(), records.len());
            fresh.extend(records);
        }

        // ── Step 4: Merge ─────────────────────────────────────────────────────
        let mut dataset: Vec<DatasetRecord> = if cfg.append && cfg.output.exists() {
            read_dataset(&cfg.output)?
        } else {
            Vec::new()
        };
        let mut seen: HashSet<String> = dataset.iter().map(|r| r.instruction.clone()).collect();

        let mut summary = CurateSummary { documents: docs.len(), ..CurateSummary::default() };
        for record in fresh {
            if seen.insert(record.instruction.clone()) {
                dataset.push(record);
                summary.added += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        summary.total = dataset.len();

        // ── Step 5: Write ─────────────────────────────────────────────────────
        if dataset.is_empty() {
            tracing::warn!("No records produced; try --strategy passages or a lower --min-words");
        }
        write_dataset(&cfg.output, &dataset)?;
        tracing::info!(
            "Wrote {} records ({} new) to '{}'",
            summary.total, summary.added, cfg.output.display()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(dir: &tempfile::TempDir, append: bool) -> CurateConfig {
        CurateConfig {
            input_dir: dir.path().join("text"),
            output:    dir.path().join("dataset.jsonl"),
            strategy:  Strategy::Headings,
            min_words: 2,
            max_words: 100,
            append,
        }
    }

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("text")).unwrap();
        fs::write(
            dir.path().join("text/guide.txt"),
            "Adapter Weights\nThe trained matrices are saved separately.\n\n\
             Serving\nA Modelfile points at the adapter.\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_curates_into_jsonl() {
        let dir = setup();
        let summary = CurateUseCase::new(config(&dir, false)).execute().unwrap();
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.added, 2);

        let records = read_dataset(&dir.path().join("dataset.jsonl")).unwrap();
        assert_eq!(records[0].instruction, "Explain Adapter Weights.");
        assert_eq!(records[1].response, "A Modelfile points at the adapter.");
    }

    #[test]
    fn test_append_keeps_edits_and_skips_duplicates() {
        let dir = setup();
        let output = dir.path().join("dataset.jsonl");
        write_dataset(&output, &[DatasetRecord::new("Explain Serving.", "Edited by hand.")]).unwrap();

        let summary = CurateUseCase::new(config(&dir, true)).execute().unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.total, 2);

        let records = read_dataset(&output).unwrap();
        assert_eq!(records[0].response, "Edited by hand.");
        assert_eq!(records[1].instruction, "Explain Adapter Weights.");
    }

    #[test]
    fn test_without_append_the_dataset_is_replaced() {
        let dir = setup();
        let output = dir.path().join("dataset.jsonl");
        write_dataset(&output, &[DatasetRecord::new("Old question", "Old answer")]).unwrap();

        let summary = CurateUseCase::new(config(&dir, false)).execute().unwrap();
        assert_eq!(summary.total, 2);
        assert!(read_dataset(&output).unwrap().iter().all(|r| r.instruction != "Old question"));
    }

    #[test]
    fn test_rejects_zero_max_words() {
        let dir = setup();
        let cfg = CurateConfig { max_words: 0, min_words: 0, ..config(&dir, false) };
        let err = CurateUseCase::new(cfg).execute().unwrap_err().to_string();
        assert!(err.contains("max_words"), "{err}");
    }
}
