// ============================================================
// Layer 4 — Causal LM Samples
// ============================================================
// Turns DatasetRecords into fixed-length next-token training rows.
//
// Sequence layout:
//   [BOS] instruction [SEP] response [EOS] [PAD] ...
//
// input_ids[t] predicts targets[t] = sequence[t + 1].
// Targets inside the prompt (everything up to and including [SEP])
// and in the padding are set to [PAD], which the loss ignores, so
// the adapter only learns to produce responses.

use anyhow::Result;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::domain::record::DatasetRecord;
use crate::infra::tokenizer_store::{encode, BOS_ID, EOS_ID, PAD_ID, SEP_ID};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmSample {
    pub input_ids: Vec<u32>,
    pub targets:   Vec<u32>,
}

impl LmSample {
    /// `None` when the prompt alone fills the window, leaving no
    /// response token to learn.
    pub fn from_ids(instruction: &[u32], response: &[u32], max_seq_len: usize) -> Option<Self> {
        let mut sequence = Vec::with_capacity(instruction.len() + response.len() + 3);
        sequence.push(BOS_ID);
        sequence.extend_from_slice(instruction);
        sequence.push(SEP_ID);
        let prompt_len = sequence.len();
        sequence.extend_from_slice(response);
        sequence.push(EOS_ID);

        if prompt_len >= max_seq_len + 1 || max_seq_len == 0 {
            return None;
        }
        sequence.truncate(max_seq_len + 1);

        let mut input_ids: Vec<u32> = sequence[..sequence.len() - 1].to_vec();
        let mut targets: Vec<u32> = sequence[1..]
            .iter()
            .enumerate()
            .map(|(t, &id)| if t + 1 < prompt_len { PAD_ID } else { id })
            .collect();

        input_ids.resize(max_seq_len, PAD_ID);
        targets.resize(max_seq_len, PAD_ID);

        Some(Self { input_ids, targets })
    }

    /// Number of positions that contribute to the loss.
    pub fn target_count(&self) -> usize {
        self.targets.iter().filter(|&&t| t != PAD_ID).count()
    }
}

/// Tokenise records into samples. Records that cannot fit are skipped
/// and counted in the log.
pub fn build_samples(
    records:     &[DatasetRecord],
    tokenizer:   &Tokenizer,
    max_seq_len: usize,
) -> Result<Vec<LmSample>> {
    let mut samples = Vec::with_capacity(records.len());
    let mut skipped = 0usize;

    for record in records {
        let instruction = encode(tokenizer, &record.instruction)?;
        let response = encode(tokenizer, &record.response)?;
        match LmSample::from_ids(&instruction, &response, max_seq_len) {
            Some(sample) => samples.push(sample),
            None => skipped += 1,
        }
    }

    let targets: usize = samples.iter().map(LmSample::target_count).sum();
    tracing::debug!("{} samples with {} response tokens", samples.len(), targets);

    if skipped > 0 {
        tracing::warn!(
            "Skipped {} records whose instruction does not fit in {} tokens",
            skipped,
            max_seq_len
        );
    }
    Ok(samples)
}

pub struct LmDataset {
    samples: Vec<LmSample>,
}

impl LmDataset {
    pub fn new(samples: Vec<LmSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mini-batches in a seeded random order; the last one may be short.
    pub fn shuffled_batches(&self, batch_size: usize, seed: u64) -> Vec<Vec<LmSample>> {
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        order
            .chunks(batch_size.max(1))
            .map(|idx| idx.iter().map(|&i| self.samples[i].clone()).collect())
            .collect()
    }

    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = &[LmSample]> + '_ {
        self.samples.chunks(batch_size.max(1))
    }
}
