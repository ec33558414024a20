//! Next-token selection: temperature scaling, then top-k, then top-p.

use std::cmp::Ordering;

use rand::Rng;
use rand::distr::{Distribution, weighted::WeightedIndex};

use crate::config::GenerationParams;
use crate::error::InferenceError;

#[derive(Debug, Clone)]
pub struct Sampler {
    do_sample: bool,
    temperature: f32,
    top_k: usize,
    top_p: f32,
}

impl Sampler {
    pub fn new(params: &GenerationParams) -> Self {
        Self {
            do_sample: params.do_sample,
            temperature: params.temperature as f32,
            top_k: params.top_k,
            top_p: params.top_p as f32,
        }
    }

    /// Picks the next token id from last-position logits.
    pub fn sample<R: Rng + ?Sized>(&self, logits: &[f32], rng: &mut R) -> Result<u32, InferenceError> {
        if logits.is_empty() {
            return Err(InferenceError::Sampling("empty logits".to_string()));
        }
        if !self.do_sample || self.temperature <= 0.0 {
            return Ok(argmax(logits));
        }

        let candidates = self.candidates(logits);
        let dist = WeightedIndex::new(candidates.iter().map(|&(_, prob)| prob))
            .map_err(|e| InferenceError::Sampling(e.to_string()))?;
        Ok(candidates[dist.sample(rng)].0)
    }

    /// Tokens that survive filtering, most likely first, with probabilities
    /// renormalised over the survivors.
    pub fn candidates(&self, logits: &[f32]) -> Vec<(u32, f32)> {
        let mut indexed: Vec<(u32, f32)> = logits
            .iter()
            .enumerate()
            .map(|(i, &logit)| (i as u32, logit / self.temperature))
            .collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        if self.top_k > 0 {
            indexed.truncate(self.top_k);
        }
        softmax(&mut indexed);

        if self.top_p < 1.0 {
            // Smallest prefix whose mass reaches top_p; never empty.
            let mut cumulative = 0.0f32;
            let mut keep = indexed.len();
            for (i, &(_, prob)) in indexed.iter().enumerate() {
                cumulative += prob;
                if cumulative >= self.top_p {
                    keep = i + 1;
                    break;
                }
            }
            indexed.truncate(keep);
            normalize(&mut indexed);
        }

        indexed
    }
}

fn argmax(logits: &[f32]) -> u32 {
    let mut best = 0;
    for (i, &logit) in logits.iter().enumerate() {
        if logit > logits[best] {
            best = i;
        }
    }
    best as u32
}

/// In-place softmax over candidate scores sorted in descending order.
fn softmax(candidates: &mut [(u32, f32)]) {
    let Some(&(_, max)) = candidates.first() else {
        return;
    };
    for (_, score) in candidates.iter_mut() {
        *score = (*score - max).exp();
    }
    normalize(candidates);
}

fn normalize(candidates: &mut [(u32, f32)]) {
    let sum: f32 = candidates.iter().map(|&(_, p)| p).sum();
    if sum > 0.0 {
        for (_, p) in candidates.iter_mut() {
            *p /= sum;
        }
    }
}
