// ============================================================
// Layer 4 — Document Loaders
// ============================================================
// Two DocumentSource implementations over a directory:
//
//   PdfLoader   → every *.pdf, text extracted page by page with
//                 the pdf-extract crate
//   TextLoader  → every *.txt, read as UTF-8 (what `extract`
//                 writes and what `curate` reads back)
//
// Files are visited in name order so repeated runs produce the
// same dataset. A file that fails to load is logged and skipped;
// only an unreadable directory is an error. A missing directory
// is an empty corpus.
//
// Reference: pdf-extract crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::document::Document;
use crate::domain::traits::DocumentSource;

/// Page separator used when joining extracted pages. The preprocessor
/// turns form feeds into paragraph breaks.
pub const PAGE_BREAK: char = '\u{000C}';

pub struct PdfLoader {
    dir: PathBuf,
}

impl PdfLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DocumentSource for PdfLoader {
    fn load_all(&self) -> Result<Vec<Document>> {
        load_dir(&self.dir, "pdf", load_single_pdf)
    }
}

pub struct TextLoader {
    dir: PathBuf,
}

impl TextLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DocumentSource for TextLoader {
    fn load_all(&self) -> Result<Vec<Document>> {
        load_dir(&self.dir, "txt", |path| {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read '{}'", path.display()))?;
            Ok(Document::new(file_name(path), text))
        })
    }
}

/// Sorted list of files in `dir` with the given extension (case-insensitive).
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case(extension));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_dir<F>(dir: &Path, extension: &str, load_one: F) -> Result<Vec<Document>>
where
    F: Fn(&Path) -> Result<Document>,
{
    if !dir.exists() {
        tracing::warn!(
            "Directory '{}' does not exist, returning empty corpus",
            dir.display()
        );
        return Ok(Vec::new());
    }

    let mut docs = Vec::new();
    for path in list_files(dir, extension)? {
        match load_one(&path) {
            Ok(doc) => {
                tracing::debug!("Loaded: {} ({} chars)", doc.source, doc.text.len());
                docs.push(doc);
            }
            Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
        }
    }

    tracing::info!("Loaded {} .{} documents from '{}'", docs.len(), extension, dir.display());
    Ok(docs)
}

fn load_single_pdf(path: &Path) -> Result<Document> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| anyhow::anyhow!("pdf-extract error in '{}': {}", path.display(), e))?;

    let separator = format!("\n{PAGE_BREAK}\n");
    let text = pages.join(&separator);

    Ok(Document::new(file_name(path), text).with_pages(pages.len()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}
