use crate::config::GenerationParams;
use crate::llm::TextGenerator;

/// Service context built once at startup and shared read-only by handlers.
pub struct AppState {
    pub generator: Box<dyn TextGenerator>,
    pub model_name: String,
    pub params: GenerationParams,
}

impl AppState {
    pub fn new(generator: Box<dyn TextGenerator>, model_name: String, params: GenerationParams) -> Self {
        Self {
            generator,
            model_name,
            params,
        }
    }
}
