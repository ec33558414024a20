use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Result as CandleResult, Tensor};
use candle_nn::var_builder::SimpleBackend;

use crate::config::Gpt2Config;
use crate::error::LoadError;
use crate::llm::activation::Activation;
use crate::llm::causal_self_attention::{Gpt2AttentionLayer, KVCache};
use crate::llm::embedding::EmbeddingLayer;
use crate::llm::layer::Layer;
use crate::llm::layer_norm::LayerNormLayer;
use crate::llm::linear::LinearLayer;
use crate::llm::mlp::MlpLayer;
use crate::llm::models::Model;

/// Pre-norm transformer block: `x + attn(ln_1(x))`, then `x + mlp(ln_2(x))`.
pub struct Gpt2Block {
    ln_1: LayerNormLayer,
    attn: Gpt2AttentionLayer,
    ln_2: LayerNormLayer,
    mlp: MlpLayer,
}

impl Gpt2Block {
    pub fn new(
        weights: &MmapedSafetensors,
        prefix: &str,
        config: &Gpt2Config,
        activation: Activation,
        device: &Device,
        dtype: DType,
    ) -> CandleResult<Self> {
        let eps = config.layer_norm_epsilon;
        let ln_1 = LayerNormLayer::new(weights, &format!("{}.ln_1", prefix), device, dtype, eps)?;
        let attn = Gpt2AttentionLayer::new(
            weights,
            &format!("{}.attn", prefix),
            config.n_head,
            config.n_embd,
            device,
            dtype,
        )?;
        let ln_2 = LayerNormLayer::new(weights, &format!("{}.ln_2", prefix), device, dtype, eps)?;
        let mlp = MlpLayer::new(weights, &format!("{}.mlp", prefix), device, dtype, activation)?;

        Ok(Self {
            ln_1,
            attn,
            ln_2,
            mlp,
        })
    }

    pub fn forward_with_cache(&self, input: &Tensor, kv_cache: &mut KVCache) -> CandleResult<Tensor> {
        let attn_output = self.attn.forward_with_cache(&self.ln_1.forward(input)?, kv_cache)?;
        let attn_residual = input.add(&attn_output)?;

        let mlp_output = self.mlp.forward(&self.ln_2.forward(&attn_residual)?)?;
        attn_residual.add(&mlp_output)
    }
}

pub struct Gpt2Model {
    wte: EmbeddingLayer,
    wpe: EmbeddingLayer,
    blocks: Vec<Gpt2Block>,
    ln_f: LayerNormLayer,
    lm_head: LinearLayer,
    max_positions: usize,
    device: Device,
}

impl Gpt2Model {
    pub fn new(
        weights: &MmapedSafetensors,
        config: &Gpt2Config,
        device: &Device,
        dtype: DType,
    ) -> Result<Self, LoadError> {
        let activation: Activation = config.activation_function.parse()?;

        // `GPT2LMHeadModel` saves under `transformer.`, a bare `GPT2Model` does not.
        let prefix = if weights.contains_tensor("transformer.wte.weight") {
            "transformer."
        } else {
            ""
        };

        let wte = EmbeddingLayer::new(weights, &format!("{}wte", prefix), device, dtype)?;
        let wpe = EmbeddingLayer::new(weights, &format!("{}wpe", prefix), device, dtype)?;

        let blocks = (0..config.n_layer)
            .map(|layer_idx| {
                Gpt2Block::new(
                    weights,
                    &format!("{}h.{}", prefix, layer_idx),
                    config,
                    activation,
                    device,
                    dtype,
                )
            })
            .collect::<CandleResult<Vec<_>>>()?;

        let ln_f = LayerNormLayer::new(
            weights,
            &format!("{}ln_f", prefix),
            device,
            dtype,
            config.layer_norm_epsilon,
        )?;

        let lm_head = if weights.contains_tensor("lm_head.weight") {
            LinearLayer::new(weights, "lm_head", device, dtype)?
        } else {
            LinearLayer::from_weights(wte.weights().clone(), None)
        };

        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            lm_head,
            max_positions: config.n_positions,
            device: device.clone(),
        })
    }
}

impl Model for Gpt2Model {
    fn forward_with_cache(
        &self,
        input_ids: &Tensor,
        kv_caches: &mut [KVCache],
        position: usize,
    ) -> CandleResult<Tensor> {
        let (b_sz, seq_len) = input_ids.dims2()?;
        let position_ids = Tensor::arange(position as u32, (position + seq_len) as u32, &self.device)?
            .unsqueeze(0)?
            .repeat((b_sz, 1))?;

        let token_embeddings = self.wte.forward(input_ids)?;
        let position_embeddings = self.wpe.forward(&position_ids)?;
        let mut hidden_states = token_embeddings.add(&position_embeddings)?;

        for (block, kv_cache) in self.blocks.iter().zip(kv_caches.iter_mut()) {
            hidden_states = block.forward_with_cache(&hidden_states, kv_cache)?;
        }

        let normed_output = self.ln_f.forward(&hidden_states)?;
        self.lm_head.forward(&normed_output)
    }

    fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    fn max_positions(&self) -> usize {
        self.max_positions
    }
}
