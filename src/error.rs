//! Error types for checkpoint loading and text generation.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading the checkpoint at startup. All of them are fatal.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("checkpoint directory not found: {0}")]
    MissingCheckpoint(PathBuf),

    #[error("missing checkpoint file: {0}")]
    MissingFile(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid checkpoint config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("unsupported model type: {0:?}")]
    UnsupportedArchitecture(String),

    #[error("unsupported activation function: {0}")]
    UnsupportedActivation(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("no end-of-sequence token in config or tokenizer")]
    MissingEosToken,

    #[error(transparent)]
    Candle(#[from] candle_core::Error),
}

/// Failures of a single generation call.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Empty input after tokenization")]
    EmptyInput,

    #[error("prompt has {len} tokens, model supports at most {max}")]
    PromptTooLong { len: usize, max: usize },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("sampling failed: {0}")]
    Sampling(String),

    #[error(transparent)]
    Candle(#[from] candle_core::Error),
}
