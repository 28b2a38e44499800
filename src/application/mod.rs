// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// One use case per subcommand. Each one orchestrates the other
// layers to accomplish its step of the workflow:
//
//   extract → curate → validate → train → modelfile → register → chat
//                                   └──────────────→ generate
//
// Rules for this layer:
//   - No ML math or model code here
//   - No terminal I/O here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// PDFs → cleaned text files
pub mod extract_use_case;

// Text files → dataset.jsonl
pub mod curate_use_case;

// Line-by-line dataset check
pub mod validate_use_case;

// LoRA training
pub mod train_use_case;

// Modelfile writer
pub mod modelfile_use_case;

// `ollama create` and chat sessions
pub mod serve_use_case;

// Local sampling from base + adapter
pub mod generate_use_case;
