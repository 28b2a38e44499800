// ============================================================
// Layer 6 — Checkpoints
// ============================================================
// Three directories, three owners:
//
//   base_dir/                  BaseStore
//     base_config.json         ← architecture (BaseModelConfig)
//     base_model.mpk.gz        ← frozen base weights
//     tokenizer.json           ← written by TokenizerStore
//
//   adapter_dir/               AdapterStore
//     adapter_model.mpk.gz     ← LoRA A/B matrices only
//     adapter_config.json      ← PEFT-style metadata
//
//   results_dir/               CheckpointManager
//     checkpoint-500/          ← an AdapterStore per save_steps
//     checkpoint-1000/
//     metrics.csv
//     train_config.json        ← effective TrainConfig of the run
//
// Weights go through burn's NamedMpkGzFileRecorder (MessagePack +
// gzip) at full precision, so a reloaded base is bit-identical to
// the one the adapter was trained against. Loading needs the
// architecture first, which is why every weights file has a JSON
// config beside it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::lora::{AdapterConfig, LoraAdapters};
use crate::ml::model::{BaseModel, BaseModelConfig};

pub const BASE_CONFIG_FILE: &str = "base_config.json";
pub const BASE_WEIGHTS: &str = "base_model";
pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";
pub const ADAPTER_WEIGHTS: &str = "adapter_model";
pub const TRAIN_CONFIG_FILE: &str = "train_config.json";

type WeightsRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Extension WeightsRecorder appends to weight files.
const WEIGHTS_EXT: &str = "mpk.gz";

/// File name the recorder writes for `stem`.
pub fn weights_file(stem: &str) -> String {
    format!("{stem}.{WEIGHTS_EXT}")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Wrote '{}'", path.display());
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed '{}'", path.display()))
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create '{}'", dir.display()))
}

// ─── Base model ───────────────────────────────────────────────────────────────
pub struct BaseStore {
    dir: PathBuf,
}

impl BaseStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.join(BASE_CONFIG_FILE).exists()
            && self.dir.join(weights_file(BASE_WEIGHTS)).exists()
    }

    pub fn save<B: Backend>(&self, config: &BaseModelConfig, model: &BaseModel<B>) -> Result<()> {
        create_dir(&self.dir)?;
        write_json(&self.dir.join(BASE_CONFIG_FILE), config)?;

        let path = self.dir.join(BASE_WEIGHTS);
        WeightsRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save base model to '{}'", path.display()))?;

        tracing::info!("Saved base model to '{}'", self.dir.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<BaseModelConfig> {
        read_json(&self.dir.join(BASE_CONFIG_FILE))
    }

    pub fn load<B: Backend>(&self, device: &B::Device) -> Result<(BaseModelConfig, BaseModel<B>)> {
        let config = self.load_config()?;
        let path = self.dir.join(BASE_WEIGHTS);
        let record = WeightsRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load base model '{}'. Has 'train' created it?", path.display())
            })?;
        let model = config.init::<B>(device).load_record(record);
        Ok((config, model))
    }
}

// ─── Adapter ──────────────────────────────────────────────────────────────────
pub struct AdapterStore {
    dir: PathBuf,
}

impl AdapterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.join(ADAPTER_CONFIG_FILE).exists()
            && self.dir.join(weights_file(ADAPTER_WEIGHTS)).exists()
    }

    pub fn save<B: Backend>(&self, adapters: &LoraAdapters<B>, config: &AdapterConfig) -> Result<()> {
        create_dir(&self.dir)?;
        write_json(&self.dir.join(ADAPTER_CONFIG_FILE), config)?;

        let path = self.dir.join(ADAPTER_WEIGHTS);
        WeightsRecorder::new()
            .record(adapters.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save adapter to '{}'", path.display()))?;

        tracing::debug!("Saved adapter to '{}'", self.dir.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<AdapterConfig> {
        read_json(&self.dir.join(ADAPTER_CONFIG_FILE))
    }

    /// Rebuild the adapter shape from adapter_config.json, then load weights.
    pub fn load<B: Backend>(
        &self,
        base:   &BaseModelConfig,
        device: &B::Device,
    ) -> Result<(AdapterConfig, LoraAdapters<B>)> {
        let config = self.load_config()?;
        let path = self.dir.join(ADAPTER_WEIGHTS);
        let record = WeightsRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load adapter '{}'. Have you run 'train' first?", path.display())
            })?;
        let adapters = config
            .to_lora_config()
            .init_adapters::<B>(base.num_layers, base.d_model, device)
            .load_record(record);
        Ok((config, adapters))
    }
}

// ─── Training run ─────────────────────────────────────────────────────────────
/// Owns the results directory of one training run.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        create_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoint_dir(&self, step: usize) -> PathBuf {
        self.dir.join(format!("checkpoint-{step}"))
    }

    pub fn save_checkpoint<B: Backend>(
        &self,
        adapters: &LoraAdapters<B>,
        config:   &AdapterConfig,
        step:     usize,
    ) -> Result<PathBuf> {
        let dir = self.checkpoint_dir(step);
        AdapterStore::new(&dir).save(adapters, config)?;
        tracing::info!("Checkpoint saved at step {} → '{}'", step, dir.display());
        Ok(dir)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        write_json(&self.dir.join(TRAIN_CONFIG_FILE), cfg)
    }
}
