//! Startup loading of a HuggingFace-style checkpoint directory.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device};
use serde::Deserialize;
use tokenizers::Tokenizer;

use crate::config::ModelConfig;
use crate::error::LoadError;
use crate::llm::models::load_model;
use crate::llm::pipeline::Pipeline;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Tokens treated as end-of-sequence when `config.json` names none.
const FALLBACK_EOS_TOKENS: [&str; 3] = ["<|endoftext|>", "</s>", "<|end_of_text|>"];

#[derive(Deserialize)]
struct WeightsIndex {
    weight_map: HashMap<String, String>,
}

/// CUDA when compiled in and present, CPU otherwise.
pub fn select_device() -> Result<Device, LoadError> {
    Ok(Device::cuda_if_available(0)?)
}

/// Half precision on accelerators, full precision on CPU.
pub fn select_dtype(device: &Device) -> DType {
    if device.is_cpu() { DType::F32 } else { DType::F16 }
}

/// Safetensors files of the checkpoint: the single-file layout, or every
/// shard listed in the index.
pub fn weight_files(checkpoint_dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let single = checkpoint_dir.join(WEIGHTS_FILE);
    if single.is_file() {
        return Ok(vec![single]);
    }

    let index_path = checkpoint_dir.join(WEIGHTS_INDEX_FILE);
    if !index_path.is_file() {
        return Err(LoadError::MissingFile(single));
    }
    let index: WeightsIndex = serde_json::from_reader(BufReader::new(File::open(&index_path)?))?;
    let shards: BTreeSet<String> = index.weight_map.into_values().collect();

    shards
        .into_iter()
        .map(|shard| {
            let path = checkpoint_dir.join(shard);
            if path.is_file() {
                Ok(path)
            } else {
                Err(LoadError::MissingFile(path))
            }
        })
        .collect()
}

pub fn load_tokenizer(path: &Path) -> Result<Tokenizer, LoadError> {
    if !path.is_file() {
        return Err(LoadError::MissingFile(path.to_path_buf()));
    }
    Tokenizer::from_file(path).map_err(|e| LoadError::Tokenizer(e.to_string()))
}

fn resolve_eos_tokens(config: &ModelConfig, tokenizer: &Tokenizer) -> Result<Vec<u32>, LoadError> {
    let from_config = config.eos_token_ids();
    if !from_config.is_empty() {
        return Ok(from_config);
    }
    FALLBACK_EOS_TOKENS
        .iter()
        .find_map(|token| tokenizer.token_to_id(token))
        .map(|id| vec![id])
        .ok_or(LoadError::MissingEosToken)
}

/// Loads tokenizer, config and weights from `checkpoint_dir` onto the best
/// available device.
pub fn load_pipeline(checkpoint_dir: &Path) -> Result<Pipeline, LoadError> {
    if !checkpoint_dir.is_dir() {
        return Err(LoadError::MissingCheckpoint(checkpoint_dir.to_path_buf()));
    }
    let device = select_device()?;
    load_pipeline_on(checkpoint_dir, device)
}

pub fn load_pipeline_on(checkpoint_dir: &Path, device: Device) -> Result<Pipeline, LoadError> {
    let config = ModelConfig::from_file(&checkpoint_dir.join(CONFIG_FILE))?;
    let tokenizer = load_tokenizer(&checkpoint_dir.join(TOKENIZER_FILE))?;
    let eos_token_ids = resolve_eos_tokens(&config, &tokenizer)?;

    let files = weight_files(checkpoint_dir)?;
    let weights = unsafe { MmapedSafetensors::multi(files.as_slice())? };

    let dtype = select_dtype(&device);
    tracing::info!(
        architecture = config.architecture(),
        device = ?device,
        dtype = ?dtype,
        shards = files.len(),
        "loading model weights"
    );
    let model = load_model(&weights, &config, &device, dtype)?;

    Ok(Pipeline::new(model, tokenizer, device, eos_token_ids))
}
