//! Tiny randomly initialised checkpoints for tests.

use std::collections::HashMap;
use std::path::Path;

use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Tensor};

use crate::config::{EosTokenId, Gpt2Config, LlamaConfig};

pub const VOCAB: [&str; 16] = [
    "<|endoftext|>",
    "hello",
    "world",
    "the",
    "erp",
    "is",
    "a",
    "software",
    "that",
    "manages",
    "business",
    "data",
    "Réponse",
    ":",
    "?",
    "what",
];

pub fn gpt2_config() -> Gpt2Config {
    Gpt2Config {
        vocab_size: VOCAB.len(),
        n_positions: 32,
        n_embd: 8,
        n_layer: 2,
        n_head: 2,
        n_inner: None,
        activation_function: "gelu_new".to_string(),
        layer_norm_epsilon: 1e-5,
        bos_token_id: Some(0),
        eos_token_id: Some(EosTokenId::Single(0)),
    }
}

pub fn llama_config() -> LlamaConfig {
    LlamaConfig {
        vocab_size: VOCAB.len(),
        hidden_size: 16,
        intermediate_size: 32,
        max_position_embeddings: 64,
        num_attention_heads: 4,
        num_hidden_layers: 2,
        num_key_value_heads: Some(2),
        hidden_activation: "silu".to_string(),
        rms_norm_eps: 1e-6,
        rope_theta: 10_000.0,
        tie_word_embeddings: false,
        bos_token_id: Some(1),
        eos_token_id: Some(EosTokenId::Single(0)),
    }
}

fn randn(shape: &[usize]) -> Tensor {
    Tensor::randn(0f32, 0.1, shape, &Device::Cpu).unwrap()
}

fn ones(len: usize) -> Tensor {
    Tensor::ones(len, DType::F32, &Device::Cpu).unwrap()
}

fn zeros(len: usize) -> Tensor {
    Tensor::zeros(len, DType::F32, &Device::Cpu).unwrap()
}

fn save(tensors: HashMap<String, Tensor>, dir: &Path) -> MmapedSafetensors {
    let path = dir.join("model.safetensors");
    candle_core::safetensors::save(&tensors, &path).unwrap();
    unsafe { MmapedSafetensors::new(&path).unwrap() }
}

/// Writes `model.safetensors` laid out like a HuggingFace GPT-2 export.
pub fn write_gpt2_weights(dir: &Path, prefix: &str) -> MmapedSafetensors {
    let cfg = gpt2_config();
    let (d, inner) = (cfg.n_embd, cfg.inner_size());
    let mut tensors = HashMap::new();

    tensors.insert(format!("{prefix}wte.weight"), randn(&[cfg.vocab_size, d]));
    tensors.insert(format!("{prefix}wpe.weight"), randn(&[cfg.n_positions, d]));
    for i in 0..cfg.n_layer {
        let block = format!("{prefix}h.{i}");
        for norm in ["ln_1", "ln_2"] {
            tensors.insert(format!("{block}.{norm}.weight"), ones(d));
            tensors.insert(format!("{block}.{norm}.bias"), zeros(d));
        }
        tensors.insert(format!("{block}.attn.c_attn.weight"), randn(&[d, 3 * d]));
        tensors.insert(format!("{block}.attn.c_attn.bias"), randn(&[3 * d]));
        tensors.insert(format!("{block}.attn.c_proj.weight"), randn(&[d, d]));
        tensors.insert(format!("{block}.attn.c_proj.bias"), randn(&[d]));
        tensors.insert(format!("{block}.mlp.c_fc.weight"), randn(&[d, inner]));
        tensors.insert(format!("{block}.mlp.c_fc.bias"), randn(&[inner]));
        tensors.insert(format!("{block}.mlp.c_proj.weight"), randn(&[inner, d]));
        tensors.insert(format!("{block}.mlp.c_proj.bias"), randn(&[d]));
    }
    tensors.insert(format!("{prefix}ln_f.weight"), ones(d));
    tensors.insert(format!("{prefix}ln_f.bias"), zeros(d));

    save(tensors, dir)
}

/// Writes `model.safetensors` laid out like a HuggingFace Llama export.
pub fn write_llama_weights(dir: &Path) -> MmapedSafetensors {
    let cfg = llama_config();
    let d = cfg.hidden_size;
    let kv = cfg.kv_heads() * (d / cfg.num_attention_heads);
    let inter = cfg.intermediate_size;
    let mut tensors = HashMap::new();

    tensors.insert("model.embed_tokens.weight".to_string(), randn(&[cfg.vocab_size, d]));
    for i in 0..cfg.num_hidden_layers {
        let layer = format!("model.layers.{i}");
        tensors.insert(format!("{layer}.self_attn.q_proj.weight"), randn(&[d, d]));
        tensors.insert(format!("{layer}.self_attn.k_proj.weight"), randn(&[kv, d]));
        tensors.insert(format!("{layer}.self_attn.v_proj.weight"), randn(&[kv, d]));
        tensors.insert(format!("{layer}.self_attn.o_proj.weight"), randn(&[d, d]));
        tensors.insert(format!("{layer}.mlp.gate_proj.weight"), randn(&[inter, d]));
        tensors.insert(format!("{layer}.mlp.up_proj.weight"), randn(&[inter, d]));
        tensors.insert(format!("{layer}.mlp.down_proj.weight"), randn(&[d, inter]));
        tensors.insert(format!("{layer}.input_layernorm.weight"), ones(d));
        tensors.insert(format!("{layer}.post_attention_layernorm.weight"), ones(d));
    }
    tensors.insert("model.norm.weight".to_string(), ones(d));
    tensors.insert("lm_head.weight".to_string(), randn(&[cfg.vocab_size, d]));

    save(tensors, dir)
}

pub fn write_gpt2_config(dir: &Path) {
    let cfg = gpt2_config();
    let config = serde_json::json!({
        "model_type": "gpt2",
        "architectures": ["GPT2LMHeadModel"],
        "vocab_size": cfg.vocab_size,
        "n_positions": cfg.n_positions,
        "n_embd": cfg.n_embd,
        "n_layer": cfg.n_layer,
        "n_head": cfg.n_head,
        "activation_function": cfg.activation_function,
        "layer_norm_epsilon": cfg.layer_norm_epsilon,
        "bos_token_id": 0,
        "eos_token_id": 0
    });
    std::fs::write(dir.join("config.json"), config.to_string()).unwrap();
}

/// Word-level tokenizer over [`VOCAB`], split on whitespace and punctuation.
pub fn write_tokenizer(dir: &Path) {
    let vocab: serde_json::Map<String, serde_json::Value> = VOCAB
        .iter()
        .enumerate()
        .map(|(id, token)| (token.to_string(), serde_json::json!(id)))
        .collect();
    let tokenizer = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [{
            "id": 0,
            "content": "<|endoftext|>",
            "single_word": false,
            "lstrip": false,
            "rstrip": false,
            "normalized": false,
            "special": true
        }],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "<|endoftext|>"
        }
    });
    std::fs::write(dir.join("tokenizer.json"), tokenizer.to_string()).unwrap();
}

pub fn write_gpt2_checkpoint(dir: &Path) {
    write_gpt2_config(dir);
    write_tokenizer(dir);
    write_gpt2_weights(dir, "transformer.");
}

pub fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    (a - b)
        .unwrap()
        .abs()
        .unwrap()
        .flatten_all()
        .unwrap()
        .max(0)
        .unwrap()
        .to_scalar::<f32>()
        .unwrap()
}
