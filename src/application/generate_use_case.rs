// ============================================================
// Layer 2 — GenerateUseCase
// ============================================================
// Local check of a trained adapter without the serving tool:
//
//   Step 1: Load tokenizer          (Layer 6 - base_dir)
//   Step 2: Load base + adapter     (Layer 6 - checkpoints)
//   Step 3: Sample a response       (Layer 5 - Generator)

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::Backend,
};
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;

use crate::application::train_use_case::ComputeDevice;
use crate::domain::traits::SamplingOptions;
use crate::infra::{
    checkpoint::{AdapterStore, BaseStore},
    tokenizer_store::TokenizerStore,
};
use crate::ml::generator::Generator;

#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub base_dir:       PathBuf,
    pub adapter_dir:    PathBuf,
    pub prompt:         String,
    pub max_new_tokens: usize,
    pub options:        SamplingOptions,
    /// Fixed seed for reproducible sampling; entropy when None
    pub seed:           Option<u64>,
    pub device:         ComputeDevice,
}

pub struct GenerateUseCase {
    config: GenerateConfig,
}

impl GenerateUseCase {
    pub fn new(config: GenerateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<String> {
        match self.config.device {
            ComputeDevice::Wgpu => self.run::<Wgpu>(&WgpuDevice::default()),
            ComputeDevice::Cpu => self.run::<NdArray>(&NdArrayDevice::Cpu),
        }
    }

    fn run<B: Backend>(&self, device: &B::Device) -> Result<String> {
        let cfg = &self.config;
        anyhow::ensure!(!cfg.prompt.trim().is_empty(), "Prompt is empty");

        let tokenizer = TokenizerStore::new(&cfg.base_dir).load()?;
        let generator = Generator::<B>::load(
            &BaseStore::new(&cfg.base_dir),
            &AdapterStore::new(&cfg.adapter_dir),
            device,
        )?;

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        generator.generate(&tokenizer, &cfg.prompt, cfg.max_new_tokens, cfg.options, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{TrainConfig, TrainUseCase};
    use crate::data::jsonl::write_dataset;
    use crate::domain::record::DatasetRecord;

    #[test]
    fn test_generates_after_training() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("dataset.jsonl");
        write_dataset(&dataset, &[
            DatasetRecord::new("What is LoRA?", "Low rank adaptation of a frozen model."),
            DatasetRecord::new("What is a Modelfile?", "A file naming the base and the adapter."),
        ])
        .unwrap();

        let train = TrainConfig {
            dataset,
            output_dir:  dir.path().join("results"),
            adapter_dir: dir.path().join("adapter_model"),
            base_dir:    dir.path().join("base"),
            epochs:      1,
            max_seq_len: 16,
            d_model:     8,
            num_heads:   2,
            num_layers:  1,
            d_ff:        16,
            lora_r:      2,
            device:      ComputeDevice::Cpu,
            ..TrainConfig::default()
        };
        TrainUseCase::new(train.clone()).execute().unwrap();

        let generate = |seed| {
            GenerateUseCase::new(GenerateConfig {
                base_dir:       train.base_dir.clone(),
                adapter_dir:    train.adapter_dir.clone(),
                prompt:         "What is LoRA?".into(),
                max_new_tokens: 5,
                options:        SamplingOptions::default(),
                seed:           Some(seed),
                device:         ComputeDevice::Cpu,
            })
            .execute()
            .unwrap()
        };
        let text = generate(9);
        assert!(text.split_whitespace().count() <= 5);
        // Same seed, same text.
        assert_eq!(text, generate(9));
    }

    #[test]
    fn test_missing_adapter_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = GenerateUseCase::new(GenerateConfig {
            base_dir:       dir.path().join("base"),
            adapter_dir:    dir.path().join("adapter_model"),
            prompt:         "hi".into(),
            max_new_tokens: 3,
            options:        SamplingOptions::default(),
            seed:           Some(1),
            device:         ComputeDevice::Cpu,
        })
        .execute();
        assert!(result.is_err());
    }
}
