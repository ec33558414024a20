use std::sync::Arc;

use anyhow::{Context, Error};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use llm_predict_serve::api::create_router;
use llm_predict_serve::llm::load_pipeline;
use llm_predict_serve::{AppState, GenerationParams, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llm_predict_serve=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::default();
    let checkpoint = std::path::absolute(&config.checkpoint_dir)
        .unwrap_or_else(|_| config.checkpoint_dir.clone());
    tracing::info!("Loading model from {}", checkpoint.display());

    // The service is useless without a model: any load failure ends the process.
    let pipeline = load_pipeline(&config.checkpoint_dir)
        .with_context(|| format!("failed to load checkpoint {}", checkpoint.display()))?;
    tracing::info!("Model loaded on {:?}", pipeline.device());

    let state = Arc::new(AppState::new(
        Box::new(pipeline),
        config.model_name(),
        GenerationParams::default(),
    ));
    let app = create_router(state);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("  GET  /health  - Health check");
    tracing::info!("  POST /predict - Generate an answer");

    axum::serve(listener, app).await?;

    Ok(())
}
