//! HTTP prediction service for a single causal language model checkpoint.
//!
//! `POST /predict` runs sampled generation on the prompt and returns the
//! extracted answer; `GET /health` reports the loaded checkpoint.

pub mod answer;
pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod llm;

pub use app_state::AppState;
pub use config::{GenerationParams, ServerConfig};
pub use error::{InferenceError, LoadError};
