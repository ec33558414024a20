//! Causal language model inference on candle.
//!
//! Layers are assembled by hand from safetensors weights; [`loader`] picks the
//! architecture from the checkpoint config and [`pipeline::Pipeline`] wraps
//! model and tokenizer behind [`pipeline::TextGenerator`].

pub mod activation;
pub mod causal_self_attention;
pub mod embedding;
pub mod gpt2;
pub mod inference;
pub mod layer;
pub mod layer_norm;
pub mod linear;
pub mod llama;
pub mod loader;
pub mod mlp;
pub mod models;
pub mod pipeline;
pub mod rms_norm;
pub mod sampling;

#[cfg(test)]
pub(crate) mod fixtures;

pub use loader::load_pipeline;
pub use models::Model;
pub use pipeline::{Pipeline, TextGenerator};
