// ============================================================
// Layer 4 — LM Batcher
// ============================================================
// Stacks equal-length LmSamples into [batch, seq] Int tensors.
//
//   [s1_t1, ..., s1_tS, s2_t1, ..., sN_tS] → reshape → [N, S]
//
// Samples are padded to max_seq_len when they are built, so no
// dynamic padding is needed here.

use burn::prelude::*;

use crate::data::dataset::LmSample;

#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// [batch_size, seq_len]
    pub inputs:  Tensor<B, 2, Int>,
    /// [batch_size, seq_len], PAD where no loss is taken
    pub targets: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct LmBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// `items` must be non-empty and share one sequence length.
    pub fn batch(&self, items: &[LmSample]) -> LmBatch<B> {
        let batch_size = items.len();
        let seq_len    = items.first().map_or(0, |s| s.input_ids.len());

        let flatten = |pick: fn(&LmSample) -> &Vec<u32>| -> Vec<i32> {
            items
                .iter()
                .flat_map(|s| pick(s).iter().map(|&x| x as i32))
                .collect()
        };
        let input_flat  = flatten(|s| &s.input_ids);
        let target_flat = flatten(|s| &s.targets);

        let inputs = Tensor::<B, 1, Int>::from_ints(input_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);
        let targets = Tensor::<B, 1, Int>::from_ints(target_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);

        LmBatch { inputs, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes_and_values() {
        let items = vec![
            LmSample { input_ids: vec![2, 10, 4], targets: vec![0, 0, 11] },
            LmSample { input_ids: vec![2, 12, 4], targets: vec![0, 0, 13] },
        ];
        let batch = LmBatcher::<NdArray>::new(Default::default()).batch(&items);

        assert_eq!(batch.inputs.dims(), [2, 3]);
        assert_eq!(batch.targets.dims(), [2, 3]);

        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(targets, vec![0, 0, 11, 0, 0, 13]);
    }
}
