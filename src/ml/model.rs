use burn::{
    nn::{
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, softmax},
};

use crate::infra::tokenizer_store::PAD_ID;
use crate::ml::lora::{LayerAdapters, LoraAdapters, LoraConfig, LoraPair};

const MASKED: f32 = -1.0e9;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct BaseModelConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    #[config(default = 128)]
    pub d_model:     usize,
    #[config(default = 4)]
    pub num_heads:   usize,
    #[config(default = 2)]
    pub num_layers:  usize,
    #[config(default = 512)]
    pub d_ff:        usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl BaseModelConfig {
    pub fn head_dim(&self) -> usize {
        self.d_model / self.num_heads.max(1)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> BaseModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<DecoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_decoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let lm_head    = LinearConfig::new(self.d_model, self.vocab_size).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        BaseModel {
            token_embedding, position_embedding, layers,
            final_norm, lm_head, dropout,
            max_seq_len: self.max_seq_len,
        }
    }

    fn build_decoder_block<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        let proj = || LinearConfig::new(self.d_model, self.d_model).init(device);
        let attn = CausalSelfAttention {
            q_proj:    proj(),
            k_proj:    proj(),
            v_proj:    proj(),
            o_proj:    proj(),
            num_heads: self.num_heads,
            head_dim:  self.head_dim(),
        };
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        DecoderBlock { attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[cfg(test)]
impl BaseModelConfig {
    /// Base weights with gradients switched off, plus fresh adapters.
    pub fn init_with_adapters<B: Backend>(
        &self,
        lora:   &LoraConfig,
        device: &B::Device,
    ) -> LoraModel<B> {
        LoraModel::new(self.init(device), lora, self)
    }
}

// ─── Attention ────────────────────────────────────────────────────────────────
// Written out by hand rather than with nn::attention so that the
// q/k/v/o projections are individually reachable by adapters.
#[derive(Module, Debug)]
pub struct CausalSelfAttention<B: Backend> {
    pub q_proj:    Linear<B>,
    pub k_proj:    Linear<B>,
    pub v_proj:    Linear<B>,
    pub o_proj:    Linear<B>,
    pub num_heads: usize,
    pub head_dim:  usize,
}

fn project<B: Backend>(
    linear:  &Linear<B>,
    adapter: Option<&LoraPair<B>>,
    x:       Tensor<B, 3>,
) -> Tensor<B, 3> {
    match adapter {
        Some(pair) => linear.forward(x.clone()) + pair.forward(x),
        None => linear.forward(x),
    }
}

/// [seq, seq] additive mask: 0 on and below the diagonal, large negative above.
fn causal_mask<B: Backend>(seq_len: usize, device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = (0..seq_len * seq_len)
        .map(|i| if i % seq_len > i / seq_len { MASKED } else { 0.0 })
        .collect();
    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([seq_len, seq_len])
}

impl<B: Backend> CausalSelfAttention<B> {
    /// x: [batch, seq, d_model] → [batch, seq, d_model]
    pub fn forward(&self, x: Tensor<B, 3>, adapters: Option<&LayerAdapters<B>>) -> Tensor<B, 3> {
        let [batch, seq, d_model] = x.dims();
        let pick = |f: fn(&LayerAdapters<B>) -> &Option<LoraPair<B>>| {
            adapters.and_then(|a| f(a).as_ref())
        };

        let heads = |t: Tensor<B, 3>| {
            t.reshape([batch, seq, self.num_heads, self.head_dim]).swap_dims(1, 2)
        };
        let q = heads(project(&self.q_proj, pick(|a| &a.q_proj), x.clone()));
        let k = heads(project(&self.k_proj, pick(|a| &a.k_proj), x.clone()));
        let v = heads(project(&self.v_proj, pick(|a| &a.v_proj), x));

        // [batch, heads, seq, seq]
        let scores = q
            .matmul(k.transpose())
            .div_scalar((self.head_dim as f64).sqrt());
        let mask = causal_mask::<B>(seq, &scores.device())
            .unsqueeze::<4>()
            .expand([batch, self.num_heads, seq, seq]);
        let weights = softmax(scores + mask, 3);

        let context = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, seq, d_model]);
        project(&self.o_proj, pick(|a| &a.o_proj), context)
    }
}

// ─── Decoder block (pre-norm) ─────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub attn:        CausalSelfAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, adapters: Option<&LayerAdapters<B>>) -> Tensor<B, 3> {
        let attn_out = self.attn.forward(self.norm1.forward(x.clone()), adapters);
        let x = x + self.dropout.forward(attn_out);
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(self.norm2.forward(x.clone()))));
        x + self.dropout.forward(ffn_out)
    }
}

// ─── Base model ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BaseModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<DecoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub lm_head:            Linear<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
}

impl<B: Backend> BaseModel<B> {
    /// input_ids: [batch, seq] → logits: [batch, seq, vocab]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, adapters: Option<&LoraAdapters<B>>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();

        let tok_emb = self.token_embedding.forward(input_ids);

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for (i, layer) in self.layers.iter().enumerate() {
            let layer_adapters = adapters.and_then(|a| a.layers.get(i));
            x = layer.forward(x, layer_adapters);
        }
        self.lm_head.forward(self.final_norm.forward(x))
    }
}

// ─── Base + adapters ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct LoraModel<B: Backend> {
    pub base:     BaseModel<B>,
    pub adapters: LoraAdapters<B>,
}

impl<B: Backend> LoraModel<B> {
    /// Attach fresh adapters to `base`. The base is frozen so only the
    /// adapter matrices receive gradients.
    pub fn new(base: BaseModel<B>, lora: &LoraConfig, config: &BaseModelConfig) -> Self {
        let device = base.lm_head.weight.val().device();
        let adapters = lora.init_adapters(config.num_layers, config.d_model, &device);
        Self { base: base.no_grad(), adapters }
    }

    pub fn from_parts(base: BaseModel<B>, adapters: LoraAdapters<B>) -> Self {
        Self { base: base.no_grad(), adapters }
    }

    pub fn max_seq_len(&self) -> usize {
        self.base.max_seq_len
    }

    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.base.forward(input_ids, Some(&self.adapters))
    }

    /// Mean next-token cross-entropy; PAD targets are ignored.
    pub fn forward_loss(&self, input_ids: Tensor<B, 2, Int>, targets: Tensor<B, 2, Int>) -> Tensor<B, 1> {
        let logits = self.forward(input_ids);
        let [batch, seq, vocab] = logits.dims();
        let ce = CrossEntropyLossConfig::new()
            .with_pad_tokens(Some(vec![PAD_ID as usize]))
            .init(&logits.device());
        ce.forward(logits.reshape([batch * seq, vocab]), targets.reshape([batch * seq]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn tiny() -> BaseModelConfig {
        BaseModelConfig::new(20, 6)
            .with_d_model(8)
            .with_num_heads(2)
            .with_num_layers(2)
            .with_d_ff(16)
            .with_dropout(0.0)
    }

    fn ids(device: &<B as Backend>::Device) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints([2, 7, 8, 4, 9, 3], device).reshape([1, 6])
    }

    #[test]
    fn test_logits_shape() {
        let device = Default::default();
        let model = tiny().init_with_adapters::<B>(&LoraConfig::new().with_rank(2), &device);
        let logits = model.forward(ids(&device));
        assert_eq!(logits.dims(), [1, 6, 20]);
    }

    #[test]
    fn test_fresh_adapters_do_not_change_the_base() {
        let device = Default::default();
        let model = tiny().init_with_adapters::<B>(&LoraConfig::new().with_rank(2), &device);

        let with: Vec<f32> = model.forward(ids(&device)).into_data().to_vec().unwrap();
        let without: Vec<f32> = model.base.forward(ids(&device), None).into_data().to_vec().unwrap();
        for (a, b) in with.iter().zip(&without) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_attention_is_causal() {
        // Changing the last token must not move the logits of earlier positions.
        let device = Default::default();
        let model = tiny().init::<B>(&device);

        let a = Tensor::<B, 1, Int>::from_ints([2, 7, 8, 4, 9, 3], &device).reshape([1, 6]);
        let b = Tensor::<B, 1, Int>::from_ints([2, 7, 8, 4, 9, 15], &device).reshape([1, 6]);
        let la: Vec<f32> = model.forward(a, None).slice([0..1, 0..5, 0..20]).into_data().to_vec().unwrap();
        let lb: Vec<f32> = model.forward(b, None).slice([0..1, 0..5, 0..20]).into_data().to_vec().unwrap();
        for (x, y) in la.iter().zip(&lb) {
            assert!((x - y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_loss_is_finite_and_positive() {
        let device = Default::default();
        let model = tiny().init_with_adapters::<B>(&LoraConfig::new().with_rank(2), &device);
        let targets = Tensor::<B, 1, Int>::from_ints([0, 0, 9, 3, 0, 0], &device).reshape([1, 6]);
        let loss: f32 = model.forward_loss(ids(&device), targets).into_scalar();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }
}
