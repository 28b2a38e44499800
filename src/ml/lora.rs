// ============================================================
// Layer 5 — LoRA Adapters
// ============================================================
// Low-Rank Adaptation: the frozen projection W stays untouched and
// a trainable low-rank update is added beside it:
//
//   y = x·W + (α / r) · dropout(x)·A·B
//
//   A: [d_in, r]   random init, small
//   B: [r, d_out]  zero init, so the adapted model starts out
//                  identical to the base
//
// Only A and B are trained and saved. The adapter file is small
// and only meaningful on top of the base it was trained against.
//
// Reference: Hu et al. (2021) LoRA: Low-Rank Adaptation of LLMs

use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig},
    prelude::*,
    tensor::Distribution,
};
use serde::{Deserialize, Serialize};

/// Projection names inside each attention block that can carry an adapter.
pub const PROJECTIONS: [&str; 4] = ["q_proj", "k_proj", "v_proj", "o_proj"];

#[derive(Config, Debug)]
pub struct LoraConfig {
    /// Rank r of the update matrices
    #[config(default = 16)]
    pub rank: usize,

    /// Scaling numerator; the update is multiplied by alpha / rank
    #[config(default = 32.0)]
    pub alpha: f64,

    #[config(default = 0.05)]
    pub dropout: f64,

    #[config(default = "vec![\"q_proj\".to_string(), \"v_proj\".to_string()]")]
    pub target_modules: Vec<String>,
}

impl LoraConfig {
    pub fn scaling(&self) -> f64 {
        self.alpha / self.rank.max(1) as f64
    }

    pub fn targets(&self, projection: &str) -> bool {
        self.target_modules.iter().any(|m| m == projection)
    }

    /// Names in `target_modules` that no attention block has.
    pub fn unknown_targets(&self) -> Vec<&str> {
        self.target_modules
            .iter()
            .map(String::as_str)
            .filter(|m| !PROJECTIONS.contains(m))
            .collect()
    }

    pub fn init_pair<B: Backend>(&self, d_in: usize, d_out: usize, device: &B::Device) -> LoraPair<B> {
        let bound = 1.0 / (d_in as f64).sqrt();
        let lora_a = Tensor::random([d_in, self.rank], Distribution::Uniform(-bound, bound), device);
        let lora_b = Tensor::zeros([self.rank, d_out], device);
        LoraPair {
            lora_a:  Param::from_tensor(lora_a),
            lora_b:  Param::from_tensor(lora_b),
            dropout: DropoutConfig::new(self.dropout).init(),
            scaling: self.scaling(),
        }
    }

    /// One adapter set per attention block, square d_model projections.
    pub fn init_adapters<B: Backend>(
        &self,
        num_layers: usize,
        d_model:    usize,
        device:     &B::Device,
    ) -> LoraAdapters<B> {
        let pair = |name: &str| {
            self.targets(name)
                .then(|| self.init_pair::<B>(d_model, d_model, device))
        };
        let layers = (0..num_layers)
            .map(|_| LayerAdapters {
                q_proj: pair("q_proj"),
                k_proj: pair("k_proj"),
                v_proj: pair("v_proj"),
                o_proj: pair("o_proj"),
            })
            .collect();
        LoraAdapters { layers }
    }
}

#[derive(Module, Debug)]
pub struct LoraPair<B: Backend> {
    pub lora_a:  Param<Tensor<B, 2>>,
    pub lora_b:  Param<Tensor<B, 2>>,
    pub dropout: Dropout,
    pub scaling: f64,
}

impl<B: Backend> LoraPair<B> {
    /// The low-rank update for `x` of shape [batch, seq, d_in].
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq, d_in] = x.dims();
        let x = self.dropout.forward(x).reshape([batch * seq, d_in]);
        let update = x
            .matmul(self.lora_a.val())
            .matmul(self.lora_b.val())
            .mul_scalar(self.scaling);
        let d_out = update.dims()[1];
        update.reshape([batch, seq, d_out])
    }
}

#[derive(Module, Debug)]
pub struct LayerAdapters<B: Backend> {
    pub q_proj: Option<LoraPair<B>>,
    pub k_proj: Option<LoraPair<B>>,
    pub v_proj: Option<LoraPair<B>>,
    pub o_proj: Option<LoraPair<B>>,
}

/// Everything that is trained and written to the adapter file.
#[derive(Module, Debug)]
pub struct LoraAdapters<B: Backend> {
    pub layers: Vec<LayerAdapters<B>>,
}

impl<B: Backend> LoraAdapters<B> {
    pub fn trainable_params(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|l| [&l.q_proj, &l.k_proj, &l.v_proj, &l.o_proj])
            .flatten()
            .map(|p| p.lora_a.val().dims().iter().product::<usize>()
                   + p.lora_b.val().dims().iter().product::<usize>())
            .sum()
    }
}

// ─── PEFT adapter_config.json ─────────────────────────────────────────────────
/// Adapter metadata in the HuggingFace PEFT schema, written next to the
/// adapter weights. It is also how `generate` rebuilds the adapter shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub peft_type: String,
    pub r: usize,
    pub lora_alpha: f64,
    pub target_modules: Vec<String>,
    pub lora_dropout: f64,
    pub bias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_model_name_or_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(default)]
    pub inference_mode: bool,
}

impl AdapterConfig {
    pub fn from_lora_config(config: &LoraConfig, base_model: Option<&str>) -> Self {
        let mut target_modules = config.target_modules.clone();
        target_modules.sort();
        target_modules.dedup();
        Self {
            peft_type: "LORA".to_string(),
            r: config.rank,
            lora_alpha: config.alpha,
            target_modules,
            lora_dropout: config.dropout,
            bias: "none".to_string(),
            base_model_name_or_path: base_model.map(String::from),
            task_type: Some("CAUSAL_LM".to_string()),
            inference_mode: true,
        }
    }

    pub fn to_lora_config(&self) -> LoraConfig {
        LoraConfig::new()
            .with_rank(self.r)
            .with_alpha(self.lora_alpha)
            .with_dropout(self.lora_dropout)
            .with_target_modules(self.target_modules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_defaults_match_reference_recipe() {
        let cfg = LoraConfig::new();
        assert_eq!(cfg.rank, 16);
        assert_eq!(cfg.alpha, 32.0);
        assert_eq!(cfg.dropout, 0.05);
        assert_eq!(cfg.scaling(), 2.0);
        assert!(cfg.targets("q_proj") && cfg.targets("v_proj"));
        assert!(!cfg.targets("k_proj"));
        assert!(cfg.unknown_targets().is_empty());
    }

    #[test]
    fn test_unknown_targets_are_reported() {
        let cfg = LoraConfig::new().with_target_modules(vec!["q_proj".into(), "gate_proj".into()]);
        assert_eq!(cfg.unknown_targets(), vec!["gate_proj"]);
    }

    #[test]
    fn test_fresh_pair_is_a_zero_update() {
        let device = Default::default();
        let pair = LoraConfig::new().with_rank(4).init_pair::<B>(8, 6, &device);
        assert_eq!(pair.lora_a.val().dims(), [8, 4]);
        assert_eq!(pair.lora_b.val().dims(), [4, 6]);

        let x = Tensor::<B, 3>::random([2, 3, 8], Distribution::Default, &device);
        let update = pair.forward(x);
        assert_eq!(update.dims(), [2, 3, 6]);
        let total: f32 = update.abs().sum().into_scalar();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_adapters_only_on_targets() {
        let device = Default::default();
        let adapters = LoraConfig::new().with_rank(2).init_adapters::<B>(3, 8, &device);
        assert_eq!(adapters.layers.len(), 3);
        assert!(adapters.layers.iter().all(|l| l.q_proj.is_some() && l.v_proj.is_some()));
        assert!(adapters.layers.iter().all(|l| l.k_proj.is_none() && l.o_proj.is_none()));
        // 3 layers × 2 projections × (8·2 + 2·8)
        assert_eq!(adapters.trainable_params(), 3 * 2 * 32);
    }

    #[test]
    fn test_peft_config_roundtrip_through_lora_config() {
        let lora = LoraConfig::new();
        let peft = AdapterConfig::from_lora_config(&lora, Some("llama3.2:3b"));
        assert_eq!(peft.peft_type, "LORA");
        assert_eq!(peft.r, 16);
        assert_eq!(peft.bias, "none");
        assert_eq!(peft.task_type.as_deref(), Some("CAUSAL_LM"));
        assert_eq!(peft.target_modules, vec!["q_proj", "v_proj"]);

        let json = serde_json::to_string(&peft).unwrap();
        let back: AdapterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, peft);

        let rebuilt = back.to_lora_config();
        assert_eq!(rebuilt.rank, lora.rank);
        assert_eq!(rebuilt.alpha, lora.alpha);
        assert_eq!(rebuilt.target_modules, peft.target_modules);
    }
}
