use crate::backend::BackendClient;
use crate::camera::{Camera, FrameSource};
use crate::config::Config;
use crate::reconcile::ReconciliationEngine;
use crate::sampler::{Sampler, SharedEngine};
use crate::server::HttpServer;
use crate::telemetry::Metrics;

use parking_lot::Mutex;
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let camera: Arc<Camera> = match Camera::new().await {
        Ok(cam) => Arc::new(cam),
        Err(e) => {
            tracing::error!("Failed to initialize camera: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let backend = Arc::new(BackendClient::new(&config.backend));
    let metrics = Arc::new(Metrics::new());
    let engine: SharedEngine = Arc::new(Mutex::new(ReconciliationEngine::new(
        config.sampler.get_hold_duration(),
    )));

    let server = HttpServer::new(
        engine.clone(),
        backend.clone(),
        camera.clone() as Arc<dyn FrameSource>,
        metrics.clone(),
        &config,
    )
    .await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();
    let sampler_shutdown_rx = shutdown_tx.subscribe();

    let sampler = Sampler::new(
        camera,
        backend,
        engine,
        metrics,
        config.sampler.get_sample_interval(),
    );
    let sampler_handle = sampler.run(sampler_shutdown_rx);

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = sampler_handle.await;
    let _ = server_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
