//! Generation configuration settings

/// Sampling hyperparameters used for every `/predict` call.
///
/// Padding is never needed: exactly one unpadded sequence is generated, and
/// the end-of-sequence token doubles as the pad token.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Maximum total sequence length, prompt tokens included
    pub max_length: usize,

    /// Sample from the distribution; greedy decoding when false
    pub do_sample: bool,

    /// Top-k filtering (0 = disabled)
    pub top_k: usize,

    /// Top-p nucleus sampling threshold
    pub top_p: f64,

    /// Temperature for sampling
    pub temperature: f64,

    /// Number of sequences to generate per prompt
    pub num_return_sequences: usize,

    /// Fixed RNG seed; fresh OS entropy per request when `None`
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: 100,
            do_sample: true,
            top_k: 50,
            top_p: 0.95,
            temperature: 0.8,
            num_return_sequences: 1,
            seed: None,
        }
    }
}

impl GenerationParams {
    /// Number of tokens to sample for a prompt of `prompt_len` tokens.
    ///
    /// At least one token is sampled even when the prompt already fills
    /// `max_length`.
    pub fn max_new_tokens(&self, prompt_len: usize) -> usize {
        self.max_length.saturating_sub(prompt_len).max(1)
    }
}
