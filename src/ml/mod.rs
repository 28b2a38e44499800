// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All burn model code lives here.
//
//   lora.rs      — LoRA config, A/B adapter pairs, PEFT-style
//                  adapter_config.json schema
//
//   model.rs     — decoder-only transformer base:
//                  • token + positional embeddings
//                  • causal multi-head self-attention with
//                    q/k/v/o projections open to adapters
//                  • pre-norm feed-forward blocks (GELU)
//                  • language-model head
//                  and LoraModel = frozen base + adapters
//
//   trainer.rs   — adapter-only training loop (Adam), step
//                  logging, step checkpoints, validation loss
//
//   generator.rs — temperature / top-p sampling from base +
//                  adapter
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Hu et al. (2021) LoRA

/// LoRA adapter modules and configuration
pub mod lora;

/// Causal transformer base model
pub mod model;

/// Adapter training loop
pub mod trainer;

/// Sampling-based text generation
pub mod generator;
