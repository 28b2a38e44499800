// ============================================================
// Layer 5 — Generator
// ============================================================
// Loads the frozen base plus a trained adapter and continues a
// prompt one token at a time:
//
//   [BOS] instruction [SEP] → logits of the last position
//       → temperature → top-p filter → sample → append
//       → stop at [EOS] or after max_new_tokens
//
// Sampling:
//   temperature == 0  → greedy (argmax)
//   otherwise         → softmax(logits / T), keep the smallest
//                       set of tokens whose mass reaches top_p,
//                       renormalise, draw one
//
// The context window is the model's max_seq_len; older tokens
// fall off the left once it is full.

use anyhow::{anyhow, Result};
use burn::prelude::*;
use rand::Rng;
use tokenizers::Tokenizer;

use crate::domain::traits::SamplingOptions;
use crate::infra::checkpoint::{AdapterStore, BaseStore};
use crate::infra::tokenizer_store::{decode, encode, BOS_ID, EOS_ID, PAD_ID, SEP_ID, UNK_ID};
use crate::ml::model::LoraModel;

/// Tokens that are never generated.
const SUPPRESSED: [u32; 4] = [PAD_ID, UNK_ID, BOS_ID, SEP_ID];

pub struct Generator<B: Backend> {
    model:  LoraModel<B>,
    device: B::Device,
}

impl<B: Backend> Generator<B> {
    pub fn new(model: LoraModel<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    pub fn load(base: &BaseStore, adapter: &AdapterStore, device: &B::Device) -> Result<Self> {
        let (base_cfg, base_model) = base.load::<B>(device)?;
        let (peft, adapters) = adapter.load::<B>(&base_cfg, device)?;
        tracing::info!(
            "Loaded base '{}' with adapter '{}' (LoRA r={} on {:?})",
            base.dir().display(), adapter.dir().display(), peft.r, peft.target_modules,
        );
        Ok(Self::new(LoraModel::from_parts(base_model, adapters), device.clone()))
    }

    /// Token ids generated after the prompt, [EOS] excluded.
    pub fn generate_ids(
        &self,
        prompt_ids:     &[u32],
        max_new_tokens: usize,
        options:        SamplingOptions,
        rng:            &mut impl Rng,
    ) -> Result<Vec<u32>> {
        let window = self.model.max_seq_len();
        let mut sequence: Vec<u32> = Vec::with_capacity(prompt_ids.len() + 2 + max_new_tokens);
        sequence.push(BOS_ID);
        sequence.extend_from_slice(prompt_ids);
        sequence.push(SEP_ID);
        let prompt_len = sequence.len();

        for _ in 0..max_new_tokens {
            let context = &sequence[sequence.len().saturating_sub(window)..];
            let mut logits = self.last_logits(context)?;
            for id in SUPPRESSED {
                if let Some(l) = logits.get_mut(id as usize) {
                    *l = f32::NEG_INFINITY;
                }
            }

            let next = sample_next(&logits, options.temperature, options.top_p, rng) as u32;
            if next == EOS_ID {
                break;
            }
            sequence.push(next);
        }

        Ok(sequence.split_off(prompt_len))
    }

    pub fn generate(
        &self,
        tokenizer:      &Tokenizer,
        prompt:         &str,
        max_new_tokens: usize,
        options:        SamplingOptions,
        rng:            &mut impl Rng,
    ) -> Result<String> {
        let prompt_ids = encode(tokenizer, prompt)?;
        let ids = self.generate_ids(&prompt_ids, max_new_tokens, options, rng)?;
        tracing::debug!("Generated {} tokens", ids.len());
        decode(tokenizer, &ids)
    }

    fn last_logits(&self, context: &[u32]) -> Result<Vec<f32>> {
        let seq_len = context.len();
        let flat: Vec<i32> = context.iter().map(|&x| x as i32).collect();
        let input = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([1, seq_len]);

        let logits = self.model.forward(input); // [1, seq, vocab]
        let [_, _, vocab] = logits.dims();
        logits
            .slice([0..1, seq_len - 1..seq_len, 0..vocab])
            .reshape([vocab])
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read logits: {e:?}"))
    }
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

/// Pick the next token index from raw logits.
pub fn sample_next(logits: &[f32], temperature: f32, top_p: f32, rng: &mut impl Rng) -> usize {
    if temperature <= 0.0 || logits.len() < 2 {
        return argmax(logits);
    }

    // Stable softmax of logits / T
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return argmax(logits);
    }
    let mut probs: Vec<(usize, f32)> = logits
        .iter()
        .enumerate()
        .map(|(i, &l)| (i, ((l - max) / temperature).exp()))
        .collect();
    let total: f32 = probs.iter().map(|p| p.1).sum();
    for p in probs.iter_mut() {
        p.1 /= total;
    }

    // Nucleus: keep the head of the sorted distribution up to top_p mass.
    probs.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let top_p = top_p.clamp(f32::MIN_POSITIVE, 1.0);
    let mut cumulative = 0.0f32;
    let mut keep = probs.len();
    for (i, p) in probs.iter().enumerate() {
        cumulative += p.1;
        if cumulative >= top_p {
            keep = i + 1;
            break;
        }
    }
    probs.truncate(keep);

    let mass: f32 = probs.iter().map(|p| p.1).sum();
    let mut draw = rng.gen::<f32>() * mass;
    for &(index, p) in &probs {
        if draw < p {
            return index;
        }
        draw -= p;
    }
    probs.last().map_or(0, |p| p.0)
}
