pub mod api;
pub mod config;
pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use pipeline::llm::{LlmError, OpenAiClient};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("LLM client setup failed: {0}")]
    Client(#[from] LlmError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize tracing. `RUST_LOG` wins over the built-in filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Start the review service and serve until Ctrl-C.
pub fn run() -> Result<(), StartupError> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let service = config::ServiceConfig::from_env()?;
    if service.api_key.is_none() {
        tracing::warn!(url = %service.llm_url, "No LLM API key configured");
    }

    // The blocking HTTP client owns its own runtime; build it before ours.
    let llm = Arc::new(OpenAiClient::from_config(&service)?);
    let cache = Arc::new(pipeline::FileRequirementCache::new(
        service.cache_dir.clone(),
        service.pipeline.cache_ttl,
    ));
    tracing::info!(
        model = %service.model,
        cache_dir = %service.cache_dir.display(),
        "Pipeline ready"
    );
    let pipeline = Arc::new(pipeline::CompliancePipeline::new(
        llm,
        cache,
        service.pipeline.clone(),
    ));

    // Dropping the blocking client inside the runtime panics, so this
    // reference outlives it.
    let _pipeline_guard = pipeline.clone();
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async move {
        let mut server = api::start_server(api::AppState::new(pipeline), service.bind_addr).await?;
        tracing::info!("Open http://{} to review a submittal", server.addr());

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
        }
        server.shutdown();
        server.wait().await;
        tracing::info!("{} stopped", config::APP_NAME);
        Ok::<(), StartupError>(())
    });
    drop(runtime);
    result
}
