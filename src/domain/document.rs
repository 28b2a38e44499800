// ============================================================
// Layer 3 — Document Domain Type
// ============================================================
// A single document loaded from disk: where it came from and the
// raw text extracted from it. Format-agnostic: by the time a
// Document exists, PDF or plain-text decoding is already done.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// File name, kept so curated records can name their source
    pub source: String,

    /// Full extracted text before cleaning
    pub text: String,

    /// Number of pages in the source, 0 when the format has none
    pub pages: usize,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text:   text.into(),
            pages:  0,
        }
    }

    pub fn with_pages(mut self, pages: usize) -> Self {
        self.pages = pages;
        self
    }

    /// Source name without its extension, e.g. "manual.pdf" → "manual"
    pub fn stem(&self) -> &str {
        match self.source.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.source,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
