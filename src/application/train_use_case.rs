// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates LoRA training in order:
//
//   Step 1: Read + validate dataset.jsonl     (Layer 4 - data)
//   Step 2: Load / build tokenizer            (Layer 6 - infra)
//   Step 3: Resolve base architecture         (Layer 6 - infra)
//   Step 4: Tokenise into LM samples          (Layer 4 - data)
//   Step 5: Seeded train/validation split     (Layer 4 - data)
//   Step 6: Save effective config             (Layer 6 - infra)
//   Step 7: Run training loop                 (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    dataset::{build_samples, LmDataset},
    jsonl::read_dataset,
    splitter::split_train_val,
};
use crate::infra::{
    checkpoint::{BaseStore, CheckpointManager},
    tokenizer_store::{TokenizerStore, SPECIAL_TOKEN_COUNT},
};
use crate::ml::lora::LoraConfig;
use crate::ml::model::BaseModelConfig;
use crate::ml::trainer::{run_training, TrainReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// GPU through wgpu
    Wgpu,
    /// CPU through ndarray
    Cpu,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Serialisable so it can be loaded with `train --config` and is
// written to results/train_config.json for every run. Missing keys
// in a config file take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub dataset:        PathBuf,
    pub output_dir:     PathBuf,
    pub adapter_dir:    PathBuf,
    pub base_dir:       PathBuf,
    /// Name recorded as base_model_name_or_path in adapter_config.json
    pub base_model:     String,

    pub batch_size:     usize,
    pub epochs:         usize,
    pub learning_rate:  f64,
    pub logging_steps:  usize,
    pub save_steps:     usize,
    pub train_fraction: f64,
    pub seed:           u64,

    // Base architecture, used only when base_dir has no model yet.
    pub max_seq_len:    usize,
    pub vocab_size:     usize,
    pub d_model:        usize,
    pub num_heads:      usize,
    pub num_layers:     usize,
    pub d_ff:           usize,
    pub dropout:        f64,

    pub lora_r:         usize,
    pub lora_alpha:     f64,
    pub lora_dropout:   f64,
    pub target_modules: Vec<String>,

    pub device:         ComputeDevice,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset:        PathBuf::from("dataset.jsonl"),
            output_dir:     PathBuf::from("results"),
            adapter_dir:    PathBuf::from("adapter_model"),
            base_dir:       PathBuf::from("base_model"),
            base_model:     "llama3.2:3b".to_string(),
            batch_size:     2,
            epochs:         3,
            learning_rate:  2e-4,
            logging_steps:  10,
            save_steps:     500,
            train_fraction: 0.9,
            seed:           42,
            max_seq_len:    128,
            vocab_size:     8000,
            d_model:        128,
            num_heads:      4,
            num_layers:     2,
            d_ff:           512,
            dropout:        0.1,
            lora_r:         16,
            lora_alpha:     32.0,
            lora_dropout:   0.05,
            target_modules: vec!["q_proj".to_string(), "v_proj".to_string()],
            device:         ComputeDevice::Wgpu,
        }
    }
}

impl TrainConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read config '{}': {}", path.display(), e))?;
        serde_json::from_str(&json)
            .map_err(|e| anyhow::anyhow!("Malformed config '{}': {}", path.display(), e))
    }

    pub fn lora_config(&self) -> LoraConfig {
        LoraConfig::new()
            .with_rank(self.lora_r)
            .with_alpha(self.lora_alpha)
            .with_dropout(self.lora_dropout)
            .with_target_modules(self.target_modules.clone())
    }

    pub fn base_model_config(&self, vocab_size: usize) -> BaseModelConfig {
        BaseModelConfig::new(vocab_size, self.max_seq_len)
            .with_d_model(self.d_model)
            .with_num_heads(self.num_heads)
            .with_num_layers(self.num_layers)
            .with_d_ff(self.d_ff)
            .with_dropout(self.dropout)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.epochs > 0, "epochs must be positive");
        ensure!(
            self.learning_rate.is_finite() && self.learning_rate > 0.0,
            "learning_rate must be positive"
        );
        ensure!(
            self.train_fraction > 0.0 && self.train_fraction <= 1.0,
            "train_fraction must be in (0, 1], got {}", self.train_fraction
        );
        ensure!(self.max_seq_len >= 4, "max_seq_len must be at least 4");
        ensure!(self.d_model > 0, "d_model must be positive");
        ensure!(self.d_ff > 0, "d_ff must be positive");
        ensure!(self.num_layers > 0, "num_layers must be positive");
        ensure!(self.vocab_size > SPECIAL_TOKEN_COUNT,
            "vocab_size must exceed the {SPECIAL_TOKEN_COUNT} special tokens");
        ensure!(self.num_heads > 0 && self.d_model % self.num_heads == 0,
            "d_model ({}) must be divisible by num_heads ({})", self.d_model, self.num_heads);
        ensure!((0.0..1.0).contains(&self.dropout), "dropout must be in [0, 1), got {}", self.dropout);
        ensure!(self.lora_r > 0, "lora_r must be positive");
        ensure!((0.0..1.0).contains(&self.lora_dropout),
            "lora_dropout must be in [0, 1), got {}", self.lora_dropout);
        ensure!(!self.target_modules.is_empty(), "target_modules is empty");

        let unknown = self.lora_config().unknown_targets().join(", ");
        if !unknown.is_empty() {
            bail!("Unknown target modules: {unknown} (expected q_proj, k_proj, v_proj or o_proj)");
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Dataset ──────────────────────────────────────────────────
        tracing::info!("Reading dataset '{}'", cfg.dataset.display());
        let records = read_dataset(&cfg.dataset)?;
        ensure!(!records.is_empty(), "Dataset '{}' has no records", cfg.dataset.display());
        tracing::info!("Loaded {} records", records.len());

        // ── Step 2: Tokenizer ────────────────────────────────────────────────
        // It belongs to the base, so it is only built together with a new base.
        let base_store = BaseStore::new(&cfg.base_dir);
        let tok_store = TokenizerStore::new(&cfg.base_dir);
        if base_store.exists() && !tok_store.exists() {
            bail!(
                "Base model in '{}' has no tokenizer.json; remove the directory to rebuild the base",
                cfg.base_dir.display()
            );
        }
        let texts: Vec<&str> = records
            .iter()
            .flat_map(|r| [r.instruction.as_str(), r.response.as_str()])
            .collect();
        let tokenizer = tok_store.load_or_build(&texts, cfg.vocab_size)?;

        // ── Step 3: Base architecture ────────────────────────────────────────
        let base_cfg = if base_store.exists() {
            let saved = base_store.load_config()?;
            if saved.max_seq_len != cfg.max_seq_len {
                tracing::warn!(
                    "Using the base model's max_seq_len={} instead of {}",
                    saved.max_seq_len, cfg.max_seq_len
                );
            }
            saved
        } else {
            cfg.base_model_config(tokenizer.get_vocab_size(true))
        };

        // ── Step 4: Samples ──────────────────────────────────────────────────
        let samples = build_samples(&records, &tokenizer, base_cfg.max_seq_len)?;
        ensure!(!samples.is_empty(), "No record fits in max_seq_len={}", base_cfg.max_seq_len);
        tracing::info!("Built {} training samples", samples.len());

        // ── Step 5: Split ────────────────────────────────────────────────────
        let (train_samples, val_samples) = split_train_val(samples, cfg.train_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 6: Save config ──────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.output_dir)?;
        ckpt.save_config(cfg)?;

        // ── Step 7: Training loop (Layer 5) ──────────────────────────────────
        run_training(
            cfg,
            &base_cfg,
            &base_store,
            &LmDataset::new(train_samples),
            &LmDataset::new(val_samples),
            &ckpt,
        )
    }
}
