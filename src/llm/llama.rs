use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Result as CandleResult, Tensor};
use candle_nn::var_builder::SimpleBackend;

use crate::config::LlamaConfig;
use crate::error::LoadError;
use crate::llm::activation::Activation;
use crate::llm::causal_self_attention::{KVCache, LlamaAttentionLayer};
use crate::llm::embedding::EmbeddingLayer;
use crate::llm::layer::Layer;
use crate::llm::linear::LinearLayer;
use crate::llm::mlp::GatedMlpLayer;
use crate::llm::models::Model;
use crate::llm::rms_norm::RMSNormLayer;

pub struct LlamaDecoderLayer {
    self_attn: LlamaAttentionLayer,
    mlp: GatedMlpLayer,
    input_norm: RMSNormLayer,
    post_attention_norm: RMSNormLayer,
}

impl LlamaDecoderLayer {
    pub fn new(
        weights: &MmapedSafetensors,
        prefix: &str,
        config: &LlamaConfig,
        activation: Activation,
        device: &Device,
        dtype: DType,
    ) -> CandleResult<Self> {
        let self_attn = LlamaAttentionLayer::new(
            weights,
            &format!("{}.self_attn", prefix),
            config.num_attention_heads,
            config.kv_heads(),
            config.hidden_size,
            config.rope_theta,
            device,
            dtype,
        )?;

        let mlp = GatedMlpLayer::new(
            weights,
            &format!("{}.mlp", prefix),
            device,
            dtype,
            activation,
        )?;

        let input_norm = RMSNormLayer::new(
            weights,
            &format!("{}.input_layernorm", prefix),
            device,
            dtype,
            config.rms_norm_eps,
        )?;

        let post_attention_norm = RMSNormLayer::new(
            weights,
            &format!("{}.post_attention_layernorm", prefix),
            device,
            dtype,
            config.rms_norm_eps,
        )?;

        Ok(Self {
            self_attn,
            mlp,
            input_norm,
            post_attention_norm,
        })
    }

    pub fn forward_with_cache(
        &self,
        input: &Tensor,
        kv_cache: &mut KVCache,
        position: usize,
    ) -> CandleResult<Tensor> {
        let normed_input = self.input_norm.forward(input)?;
        let attn_output = self.self_attn.forward_with_cache(&normed_input, kv_cache, position)?;
        let attn_residual = input.add(&attn_output)?;

        let normed_attn = self.post_attention_norm.forward(&attn_residual)?;
        let mlp_output = self.mlp.forward(&normed_attn)?;
        attn_residual.add(&mlp_output)
    }
}

pub struct LlamaModel {
    embed_layer: EmbeddingLayer,
    decoder_layers: Vec<LlamaDecoderLayer>,
    norm_layer: RMSNormLayer,
    lm_head: LinearLayer,
    max_positions: usize,
}

impl LlamaModel {
    pub fn new(
        weights: &MmapedSafetensors,
        config: &LlamaConfig,
        device: &Device,
        dtype: DType,
    ) -> Result<Self, LoadError> {
        let activation: Activation = config.hidden_activation.parse()?;

        let embed_layer = EmbeddingLayer::new(weights, "model.embed_tokens", device, dtype)?;

        let decoder_layers = (0..config.num_hidden_layers)
            .map(|layer_idx| {
                LlamaDecoderLayer::new(
                    weights,
                    &format!("model.layers.{}", layer_idx),
                    config,
                    activation,
                    device,
                    dtype,
                )
            })
            .collect::<CandleResult<Vec<_>>>()?;

        let norm_layer =
            RMSNormLayer::new(weights, "model.norm", device, dtype, config.rms_norm_eps)?;

        // Tied checkpoints usually omit `lm_head.weight`.
        let lm_head = if config.tie_word_embeddings || !weights.contains_tensor("lm_head.weight") {
            LinearLayer::from_weights(embed_layer.weights().clone(), None)
        } else {
            LinearLayer::new(weights, "lm_head", device, dtype)?
        };

        Ok(Self {
            embed_layer,
            decoder_layers,
            norm_layer,
            lm_head,
            max_positions: config.max_position_embeddings,
        })
    }
}

impl Model for LlamaModel {
    fn forward_with_cache(
        &self,
        input_ids: &Tensor,
        kv_caches: &mut [KVCache],
        position: usize,
    ) -> CandleResult<Tensor> {
        let mut hidden_states = self.embed_layer.forward(input_ids)?;
        for (layer, kv_cache) in self.decoder_layers.iter().zip(kv_caches.iter_mut()) {
            hidden_states = layer.forward_with_cache(&hidden_states, kv_cache, position)?;
        }

        let normed_output = self.norm_layer.forward(&hidden_states)?;
        self.lm_head.forward(&normed_output)
    }

    fn num_layers(&self) -> usize {
        self.decoder_layers.len()
    }

    fn max_positions(&self) -> usize {
        self.max_positions
    }
}
