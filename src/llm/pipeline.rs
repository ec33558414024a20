use candle_core::Device;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokenizers::Tokenizer;

use crate::config::GenerationParams;
use crate::error::InferenceError;
use crate::llm::inference;
use crate::llm::models::Model;

/// Prompt in, decoded text out. The seam between the HTTP layer and the
/// inference stack.
pub trait TextGenerator: Send + Sync {
    /// Returns the decoded sequence, prompt included, with special tokens
    /// removed. Fails with [`InferenceError::EmptyInput`] when the prompt
    /// tokenizes to nothing.
    fn generate_text(&self, prompt: &str, params: &GenerationParams) -> Result<String, InferenceError>;
}

/// Tokenizer, model and device of the loaded checkpoint.
pub struct Pipeline {
    model: Box<dyn Model>,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_ids: Vec<u32>,
}

impl Pipeline {
    pub fn new(
        model: Box<dyn Model>,
        tokenizer: Tokenizer,
        device: Device,
        eos_token_ids: Vec<u32>,
    ) -> Self {
        Self {
            model,
            tokenizer,
            device,
            eos_token_ids,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn eos_token_ids(&self) -> &[u32] {
        &self.eos_token_ids
    }

    pub fn encode(&self, prompt: &str) -> Result<Vec<u32>, InferenceError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String, InferenceError> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))
    }
}

impl TextGenerator for Pipeline {
    fn generate_text(&self, prompt: &str, params: &GenerationParams) -> Result<String, InferenceError> {
        let input_ids = self.encode(prompt)?;
        if input_ids.is_empty() {
            return Err(InferenceError::EmptyInput);
        }

        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let output_ids = inference::generate(
            self.model.as_ref(),
            &input_ids,
            params,
            &self.eos_token_ids,
            &self.device,
            &mut rng,
        )?;
        tracing::debug!(
            prompt_tokens = input_ids.len(),
            generated_tokens = output_ids.len() - input_ids.len(),
            "generation finished"
        );

        self.decode(&output_ids)
    }
}
