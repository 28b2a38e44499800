// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer depends on these traits, not on the
// concrete loaders and clients that implement them.
//
//   PdfLoader / TextLoader  → DocumentSource
//   OllamaClient            → ChatBackend

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::document::Document;

// ─── DocumentSource ───────────────────────────────────────────────────────────
/// Any component that can load documents from a source.
pub trait DocumentSource {
    /// Load all available documents. Unreadable individual files are
    /// skipped by implementations; only source-level failures are errors.
    fn load_all(&self) -> Result<Vec<Document>>;
}

// ─── ChatBackend ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role:    Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Sampling options forwarded to whichever backend produces text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p:       f32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self { temperature: 0.7, top_p: 0.9 }
    }
}

/// Anything that can continue a conversation with a named model.
pub trait ChatBackend {
    fn chat(
        &self,
        model:    &str,
        messages: &[ChatMessage],
        options:  SamplingOptions,
    ) -> Result<String>;
}
