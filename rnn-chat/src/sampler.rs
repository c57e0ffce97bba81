use rand::Rng;

use crate::error::{Result, RnnError};

/// Top-k sampler over an already temperature-scaled distribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopK {
    k: usize,
}

impl TopK {
    pub fn new(k: usize) -> Result<Self> {
        if k < 1 {
            return Err(RnnError::Config("top_k must be at least 1".into()));
        }
        Ok(TopK { k })
    }

    /// Draws an index from the `k` most probable entries, renormalised.
    /// Ties keep their original order and NaN entries rank last. A zero-mass
    /// subset yields its first entry; a walk that rounds short of the draw
    /// yields the last kept entry.
    pub fn sample<R: Rng + ?Sized>(&self, probs: &[f32], rng: &mut R) -> usize {
        assert!(!probs.is_empty(), "cannot sample from an empty distribution");
        let mut ranked: Vec<usize> = (0..probs.len()).collect();
        let weight = |i: usize| if probs[i].is_nan() { f32::NEG_INFINITY } else { probs[i] };
        ranked.sort_by(|&a, &b| weight(b).total_cmp(&weight(a)));
        ranked.truncate(self.k.min(probs.len()));

        let sum: f32 = ranked.iter().map(|&i| probs[i]).sum();
        if !(sum > 0.0) { return ranked[0]; }

        let r: f32 = rng.gen();
        let mut acc = 0.0f32;
        for &i in &ranked {
            acc += probs[i] / sum;
            if acc >= r { return i; }
        }
        ranked[ranked.len() - 1]
    }
}
