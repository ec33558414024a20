//! Server configuration settings

use std::path::PathBuf;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Checkpoint directory, relative to the working directory
    pub checkpoint_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            checkpoint_dir: PathBuf::from("checkpoint-100"),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base name of the checkpoint directory, reported by `/health`.
    pub fn model_name(&self) -> String {
        self.checkpoint_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.checkpoint_dir.display().to_string())
    }
}
