use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Result as CandleResult, Tensor};

use crate::config::ModelConfig;
use crate::error::LoadError;
use crate::llm::causal_self_attention::KVCache;
use crate::llm::gpt2::Gpt2Model;
use crate::llm::llama::LlamaModel;

/// A causal language model producing `(batch, seq, vocab)` logits.
///
/// Implementations are read-only after loading; all per-request state lives
/// in the caller's KV caches, so one model can serve concurrent requests.
pub trait Model: Send + Sync {
    /// Runs `input_ids` (`(batch, seq)`, u32) starting at absolute `position`,
    /// extending one cache per layer.
    fn forward_with_cache(
        &self,
        input_ids: &Tensor,
        kv_caches: &mut [KVCache],
        position: usize,
    ) -> CandleResult<Tensor>;

    fn num_layers(&self) -> usize;

    /// Longest sequence the position encoding supports.
    fn max_positions(&self) -> usize;

    fn forward(&self, input_ids: &Tensor) -> CandleResult<Tensor> {
        let mut kv_caches = vec![KVCache::new(); self.num_layers()];
        self.forward_with_cache(input_ids, &mut kv_caches, 0)
    }
}

/// Builds the model class named by the checkpoint's `model_type`.
pub fn load_model(
    weights: &MmapedSafetensors,
    config: &ModelConfig,
    device: &Device,
    dtype: DType,
) -> Result<Box<dyn Model>, LoadError> {
    let model: Box<dyn Model> = match config {
        ModelConfig::Gpt2(cfg) => Box::new(Gpt2Model::new(weights, cfg, device, dtype)?),
        ModelConfig::Llama(cfg) => Box::new(LlamaModel::new(weights, cfg, device, dtype)?),
    };
    Ok(model)
}
