// ============================================================
// Layer 5 — Training Loop
// ============================================================
// LoRA fine-tuning with Adam. Only the adapter matrices have
// gradients; the base stays exactly as it was loaded.
//
// Per optimiser step:
//   forward → masked cross-entropy → backward → Adam update
//
// Every `logging_steps` steps: mean loss of the window is logged
//                             and appended to metrics.csv
// Every `save_steps` steps:    adapter checkpoint-<step>/
// Every epoch:                 validation loss (inner backend,
//                             no autodiff, no dropout)
// At the end:                  final adapter → adapter_dir
//
// Generic over AutodiffBackend so the same loop runs on Wgpu
// in production and on NdArray in tests.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::application::train_use_case::{ComputeDevice, TrainConfig};
use crate::data::{batcher::LmBatcher, dataset::LmDataset};
use crate::infra::{
    checkpoint::{AdapterStore, BaseStore, CheckpointManager},
    metrics::{MetricsLogger, Split, StepMetrics},
};
use crate::ml::lora::AdapterConfig;
use crate::ml::model::{BaseModelConfig, LoraModel};

/// Summary returned to the use case.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub steps:            usize,
    pub trainable_params: usize,
    /// Mean training loss of the last epoch
    pub final_train_loss: f64,
    /// None when there was no validation split
    pub final_val_loss:   Option<f64>,
}

pub fn run_training(
    cfg:        &TrainConfig,
    base_cfg:   &BaseModelConfig,
    base_store: &BaseStore,
    train:      &LmDataset,
    val:        &LmDataset,
    ckpt:       &CheckpointManager,
) -> Result<TrainReport> {
    match cfg.device {
        ComputeDevice::Wgpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            train_loop::<Autodiff<Wgpu>>(cfg, base_cfg, base_store, train, val, ckpt, &device)
                .map(|(_, report)| report)
        }
        ComputeDevice::Cpu => {
            let device = NdArrayDevice::Cpu;
            tracing::info!("Using CPU (ndarray) backend");
            train_loop::<Autodiff<NdArray>>(cfg, base_cfg, base_store, train, val, ckpt, &device)
                .map(|(_, report)| report)
        }
    }
}

pub(crate) fn train_loop<B: AutodiffBackend>(
    cfg:        &TrainConfig,
    base_cfg:   &BaseModelConfig,
    base_store: &BaseStore,
    train:      &LmDataset,
    val:        &LmDataset,
    ckpt:       &CheckpointManager,
    device:     &B::Device,
) -> Result<(LoraModel<B>, TrainReport)> {
    B::seed(cfg.seed);

    // ── Base model: reuse the saved one or create and save it ─────────────────
    let base = if base_store.exists() {
        tracing::info!("Loading base model from '{}'", base_store.dir().display());
        base_store.load::<B>(device)?.1
    } else {
        tracing::info!("No base model in '{}', initialising from seed {}", base_store.dir().display(), cfg.seed);
        let base = base_cfg.init::<B>(device);
        base_store.save(base_cfg, &base)?;
        base
    };

    let lora = cfg.lora_config();
    let mut model = LoraModel::new(base, &lora, base_cfg);
    let peft = AdapterConfig::from_lora_config(&lora, Some(&cfg.base_model));
    let trainable_params = model.adapters.trainable_params();
    tracing::info!(
        "Model ready: {} layers, d_model={}, LoRA r={} α={} on {:?} ({} trainable params)",
        base_cfg.num_layers, base_cfg.d_model, lora.rank, lora.alpha,
        lora.target_modules, trainable_params,
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new()
        .with_epsilon(1e-8)
        .init::<B, LoraModel<B>>();

    let metrics = MetricsLogger::new(ckpt.dir())?;
    tracing::info!(
        "Training on {} samples ({} validation), metrics → '{}'",
        train.len(), val.len(), metrics.csv_path().display()
    );
    let train_batcher = LmBatcher::<B>::new(device.clone());
    let val_batcher   = LmBatcher::<B::InnerBackend>::new(device.clone());

    let mut step = 0usize;
    let mut window_sum = 0.0f64;
    let mut window_len = 0usize;
    let mut last_train_loss = f64::NAN;
    let mut last_val_loss = None;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let mut epoch_sum = 0.0f64;
        let mut epoch_batches = 0usize;

        for items in train.shuffled_batches(cfg.batch_size, cfg.seed.wrapping_add(epoch as u64)) {
            let batch = train_batcher.batch(&items);
            let loss = model.forward_loss(batch.inputs, batch.targets);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            epoch_sum += loss_val;
            epoch_batches += 1;
            window_sum += loss_val;
            window_len += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
            step += 1;

            if cfg.logging_steps > 0 && step % cfg.logging_steps == 0 {
                let mean = window_sum / window_len as f64;
                tracing::info!("step {:>6} | epoch {} | loss {:.4}", step, epoch, mean);
                metrics.log(&StepMetrics::new(step, epoch, Split::Train, mean, cfg.learning_rate))?;
                window_sum = 0.0;
                window_len = 0;
            }

            if cfg.save_steps > 0 && step % cfg.save_steps == 0 {
                ckpt.save_checkpoint(&model.adapters, &peft, step)?;
            }
        }

        last_train_loss = if epoch_batches > 0 {
            epoch_sum / epoch_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        let val_loss = if val.is_empty() {
            None
        } else {
            let model_valid = model.valid();
            let mut sum = 0.0f64;
            let mut batches = 0usize;
            for items in val.batches(cfg.batch_size) {
                let batch = val_batcher.batch(items);
                let loss = model_valid.forward_loss(batch.inputs, batch.targets);
                sum += loss.into_scalar().elem::<f64>();
                batches += 1;
            }
            let mean = sum / batches.max(1) as f64;
            metrics.log(&StepMetrics::new(step, epoch, Split::Val, mean, cfg.learning_rate))?;
            Some(mean)
        };
        last_val_loss = val_loss;

        match val_loss {
            Some(v) => println!(
                "Epoch {:>3}/{} | step {:>6} | train_loss={:.4} | val_loss={:.4}",
                epoch, cfg.epochs, step, last_train_loss, v,
            ),
            None => println!(
                "Epoch {:>3}/{} | step {:>6} | train_loss={:.4}",
                epoch, cfg.epochs, step, last_train_loss,
            ),
        }
    }

    // ── Final adapter ─────────────────────────────────────────────────────────
    AdapterStore::new(&cfg.adapter_dir).save(&model.adapters, &peft)?;
    tracing::info!("Adapter saved to '{}'", cfg.adapter_dir.display());

    let report = TrainReport {
        steps: step,
        trainable_params,
        final_train_loss: last_train_loss,
        final_val_loss: last_val_loss,
    };
    Ok((model, report))
}
