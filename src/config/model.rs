use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;

/// `eos_token_id` is a single id in most checkpoints and a list in some.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EosTokenId {
    Single(u32),
    Multiple(Vec<u32>),
}

impl EosTokenId {
    pub fn to_vec(&self) -> Vec<u32> {
        match self {
            EosTokenId::Single(id) => vec![*id],
            EosTokenId::Multiple(ids) => ids.clone(),
        }
    }
}

/// GPT-2 `config.json`.
#[derive(Deserialize, Debug, Clone)]
pub struct Gpt2Config {
    pub vocab_size: usize,
    pub n_positions: usize,
    pub n_embd: usize,
    pub n_layer: usize,
    pub n_head: usize,
    #[serde(default)]
    pub n_inner: Option<usize>,
    #[serde(default = "default_gpt2_activation")]
    pub activation_function: String,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
    #[serde(default)]
    pub bos_token_id: Option<u32>,
    #[serde(default)]
    pub eos_token_id: Option<EosTokenId>,
}

impl Gpt2Config {
    pub fn inner_size(&self) -> usize {
        self.n_inner.unwrap_or(4 * self.n_embd)
    }
}

/// Llama `config.json`.
#[derive(Deserialize, Debug, Clone)]
pub struct LlamaConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub intermediate_size: usize,
    pub max_position_embeddings: usize,
    pub num_attention_heads: usize,
    pub num_hidden_layers: usize,
    #[serde(default)]
    pub num_key_value_heads: Option<usize>,
    #[serde(rename = "hidden_act", default = "default_llama_activation")]
    pub hidden_activation: String,
    #[serde(default = "default_rms_norm_eps")]
    pub rms_norm_eps: f64,
    #[serde(default = "default_rope_theta")]
    pub rope_theta: f32,
    #[serde(default)]
    pub tie_word_embeddings: bool,
    #[serde(default)]
    pub bos_token_id: Option<u32>,
    #[serde(default)]
    pub eos_token_id: Option<EosTokenId>,
}

impl LlamaConfig {
    pub fn kv_heads(&self) -> usize {
        self.num_key_value_heads.unwrap_or(self.num_attention_heads)
    }
}

fn default_gpt2_activation() -> String {
    "gelu_new".to_string()
}

fn default_llama_activation() -> String {
    "silu".to_string()
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

fn default_rms_norm_eps() -> f64 {
    1e-6
}

fn default_rope_theta() -> f32 {
    10_000.0
}

/// Architecture config of the loaded checkpoint, dispatched on `model_type`.
#[derive(Debug, Clone)]
pub enum ModelConfig {
    Gpt2(Gpt2Config),
    Llama(LlamaConfig),
}

impl ModelConfig {
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        if !path.is_file() {
            return Err(LoadError::MissingFile(path.to_path_buf()));
        }
        let raw: serde_json::Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        Self::from_value(raw)
    }

    pub fn from_value(raw: serde_json::Value) -> Result<Self, LoadError> {
        let model_type = raw
            .get("model_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        match model_type.as_str() {
            "gpt2" => Ok(ModelConfig::Gpt2(serde_json::from_value(raw)?)),
            "llama" => Ok(ModelConfig::Llama(serde_json::from_value(raw)?)),
            _ => Err(LoadError::UnsupportedArchitecture(model_type)),
        }
    }

    pub fn architecture(&self) -> &'static str {
        match self {
            ModelConfig::Gpt2(_) => "gpt2",
            ModelConfig::Llama(_) => "llama",
        }
    }

    pub fn eos_token_ids(&self) -> Vec<u32> {
        let eos = match self {
            ModelConfig::Gpt2(cfg) => cfg.eos_token_id.as_ref(),
            ModelConfig::Llama(cfg) => cfg.eos_token_id.as_ref(),
        };
        eos.map(EosTokenId::to_vec).unwrap_or_default()
    }
}
