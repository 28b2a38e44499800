// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles samples and splits them into:
//   - Training set:   used to update the adapter weights
//   - Validation set: used to watch for overfitting
//
// The shuffle is seeded so a given dataset and seed always give
// the same split, so rerunning `train` with more epochs evaluates
// on the same held-out records.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `train_fraction` is clamped to [0, 1]. When the dataset has at
/// least two samples and the fraction is below 1, validation keeps
/// at least one sample and training keeps at least one.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let mut split_at = ((total as f64) * fraction).round() as usize;
    if total >= 2 && fraction < 1.0 {
        split_at = split_at.clamp(1, total - 1);
    }
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}
