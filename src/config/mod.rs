//! Service configuration.
//!
//! Everything here is fixed at compile time: the checkpoint path, the bind
//! address and the sampling hyperparameters are not user-configurable.

mod generation;
mod model;
mod server;

pub use generation::GenerationParams;
pub use model::{EosTokenId, Gpt2Config, LlamaConfig, ModelConfig};
pub use server::ServerConfig;
