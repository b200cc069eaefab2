use anyhow::{Context, Result};
use rollcall_core::OnnxFaceEncoder;
use rollcall_store::{FaceStore, MemoryFaceStore, S3FaceStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod attendance;
mod config;
mod engine;
mod routes;

#[cfg(test)]
mod testing;

use attendance::AttendanceService;
use config::{Config, StoreBackend};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rollcalld starting");

    let config = Config::from_env();
    tracing::info!(
        bind = %config.bind,
        model_dir = %config.model_dir.display(),
        store = ?config.store,
        threshold = config.similarity_threshold,
        policy = %config.match_policy,
        "configuration loaded"
    );

    let encoder = OnnxFaceEncoder::load(&config.scrfd_model_path(), &config.arcface_model_path())
        .context("failed to load face models")?;
    let engine = engine::spawn_engine(Box::new(encoder))?;
    tracing::info!("face models loaded");

    let store: Arc<dyn FaceStore> = match config.store {
        StoreBackend::S3 => Arc::new(S3FaceStore::connect(&config.s3).await),
        StoreBackend::Memory => {
            tracing::warn!("using in-memory face store; registrations are lost on exit");
            Arc::new(MemoryFaceStore::new())
        }
    };

    let service = AttendanceService::new(
        engine,
        store,
        config.match_policy,
        config.similarity_threshold,
    );
    let app = routes::router(Arc::new(service), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(addr = %config.bind, "rollcalld ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("rollcalld shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
