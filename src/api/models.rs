use serde::{Deserialize, Serialize};

/// Label echoed back when the request names no model.
pub const DEFAULT_MODEL_LABEL: &str = "gpt2";

#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Legacy alias for `prompt`.
    #[serde(default)]
    pub question: Option<String>,
    /// Echoed back only; the service always runs its one checkpoint.
    #[serde(default)]
    pub model: Option<String>,
}

impl PredictRequest {
    /// First non-empty of `prompt` and `question`, untrimmed.
    pub fn prompt_text(&self) -> &str {
        [&self.prompt, &self.question]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|text| !text.is_empty())
            .unwrap_or_default()
    }

    pub fn model_label(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_LABEL.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub response: String,
    pub model: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}
