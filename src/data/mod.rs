// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a folder of PDFs and a training batch:
//
//   .pdf / .txt files
//       │
//       ▼
//   PdfLoader / TextLoader → raw text per document
//       │
//       ▼
//   Preprocessor           → clean layout noise
//       │
//       ▼
//   Curator (+ Chunker)    → instruction/response records
//       │
//       ▼
//   jsonl                  → dataset.jsonl on disk, hand-edited
//       │
//       ▼
//   build_samples          → [BOS] instr [SEP] resp [EOS] token rows
//       │
//       ▼
//   split_train_val        → seeded train/validation split
//       │
//       ▼
//   LmBatcher              → [batch, seq] Int tensors

/// Reads PDFs and plain-text files from a directory
pub mod loader;

/// Cleans raw extracted text
pub mod preprocessor;

/// Word windows with overlap
pub mod chunker;

/// Document text → instruction/response records
pub mod curator;

/// JSONL dataset read, write and validation
pub mod jsonl;

/// Tokenised next-token samples
pub mod dataset;

/// Samples → tensors
pub mod batcher;

/// Seeded train/validation split
pub mod splitter;
