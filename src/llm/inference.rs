use candle_core::{DType, Device, IndexOp, Tensor};
use rand::Rng;

use crate::config::GenerationParams;
use crate::error::InferenceError;
use crate::llm::causal_self_attention::KVCache;
use crate::llm::models::Model;
use crate::llm::sampling::Sampler;

/// Autoregressively extends `prompt_ids` and returns prompt plus continuation.
///
/// The prompt goes through the model once; every later step feeds only the
/// last sampled token and reuses the per-layer KV caches. Generation stops on
/// any of `eos_token_ids` (not appended) or once `params.max_length` total
/// tokens are reached.
pub fn generate<R: Rng + ?Sized>(
    model: &dyn Model,
    prompt_ids: &[u32],
    params: &GenerationParams,
    eos_token_ids: &[u32],
    device: &Device,
    rng: &mut R,
) -> Result<Vec<u32>, InferenceError> {
    if prompt_ids.is_empty() {
        return Err(InferenceError::EmptyInput);
    }
    let max_positions = model.max_positions();
    if prompt_ids.len() >= max_positions {
        return Err(InferenceError::PromptTooLong {
            len: prompt_ids.len(),
            max: max_positions,
        });
    }

    let max_new_tokens = params
        .max_new_tokens(prompt_ids.len())
        .min(max_positions - prompt_ids.len());
    let sampler = Sampler::new(params);

    let mut kv_caches = vec![KVCache::new(); model.num_layers()];
    let mut tokens = prompt_ids.to_vec();
    let mut position = 0;
    let mut input_ids = prompt_ids.to_vec();

    for _ in 0..max_new_tokens {
        let input_tensor = Tensor::from_slice(&input_ids, (1, input_ids.len()), device)?;
        let output = model.forward_with_cache(&input_tensor, &mut kv_caches, position)?;
        position += input_ids.len();

        // Only the last position predicts the next token.
        let next_token_logits = output
            .i((0, output.dim(1)? - 1))?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;
        let next_token = sampler.sample(&next_token_logits, rng)?;

        if eos_token_ids.contains(&next_token) {
            break;
        }

        tokens.push(next_token);
        input_ids = vec![next_token];
    }

    Ok(tokens)
}
