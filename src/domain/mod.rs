// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that every other layer talks in terms of:
//
//   Document       → text extracted from one source file
//   DatasetRecord  → one instruction/response training pair
//   Modelfile      → the serving tool's declarative model config
//
// Rules for this layer:
//   - NO burn types
//   - NO file I/O or network calls
//   - Parsing and rendering of text formats is fine (pure functions)
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A loaded document from disk
pub mod document;

// An instruction/response pair and its line-level validation
pub mod record;

// Ollama Modelfile directives, parser and renderer
pub mod modelfile;

// Core abstractions (traits) that other layers implement
pub mod traits;
