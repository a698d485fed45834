//! Vectorization Server Main
//!
//! Loads the configured model, then binds and serves. A model that fails to
//! load ends the process before anything is listening.

use std::sync::Arc;

use tracing::{error, info};
use vectorization_server::models::{ModelConfig, OnnxEmbeddingModel, VectorizationService};
use vectorization_server::{BoxError, HttpServer, ServerConfig};

fn init_tracing(config: &ServerConfig) {
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => "vectorization_server=trace,trace",
        "debug" => "vectorization_server=debug,debug",
        "info" => "vectorization_server=info,info",
        "warn" => "vectorization_server=warn,warn",
        "error" => "vectorization_server=error,error",
        _ => "vectorization_server=info,info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&ServerConfig::default());
            error!("❌ Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    init_tracing(&config);

    info!("🚀 Vectorization Server v{}", env!("CARGO_PKG_VERSION"));
    info!("🔤 Loading model: {}", config.model_name);

    let model_config = ModelConfig::from_server_config(&config);
    let model = match tokio::task::spawn_blocking(move || OnnxEmbeddingModel::load(&model_config)).await? {
        Ok(model) => model,
        Err(e) => {
            error!("❌ Failed to load model {}: {}", config.model_name, e);
            return Err(e.into());
        }
    };
    let service = VectorizationService::new(Arc::new(model));
    info!(
        "✅ Model loaded successfully. Vector size: {}",
        service.dimensions()
    );

    let addr = match config.bind_address().await {
        Ok(addr) => addr,
        Err(e) => {
            error!("❌ {}", e);
            return Err(e.into());
        }
    };
    let server = match HttpServer::bind(addr, service).await {
        Ok(server) => server,
        Err(e) => {
            error!("❌ Failed to bind {}: {}", addr, e);
            return Err(e);
        }
    };

    info!("📡 Ready on {}", server.local_addr());
    info!("🛑 Press Ctrl+C to stop");
    server.serve().await
}
