// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that touch the outside world:
//
//   checkpoint.rs      — base, adapter and per-step checkpoint
//                        directories (full-precision MessagePack + JSON)
//
//   tokenizer_store.rs — builds or loads the word-level tokenizer
//                        that lives beside the base weights
//
//   metrics.rs         — appends step/validation loss to CSV
//
//   ollama.rs          — `ollama create` and the HTTP chat API
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Base, adapter and training-run checkpoints
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

/// Ollama CLI and HTTP client
pub mod ollama;
