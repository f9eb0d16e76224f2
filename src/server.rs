//! Engine lifecycle bound to the server: initialize before binding, shut
//! down once after the last connection drains.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    app,
    engine::{ImageEngine, Raster},
    Config,
};

/// Initialize the engine. Any failure aborts startup.
pub fn configure(config: &Config) -> Result<Arc<Raster>> {
    let engine = Raster::initialize(config.engine_options())
        .context("image engine failed to start")?;
    info!(
        version = %engine.version(),
        codec = engine.codec_version(),
        text = engine.text_version(),
        "image engine ready"
    );
    Ok(Arc::new(engine))
}

pub async fn serve(config: Config) -> Result<()> {
    let engine = configure(&config)?;
    let router = app(Arc::clone(&engine), &config.mount, config.body_limit);

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("cannot listen on {}", config.listen))?;
    info!("listening on {}", config.listen);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    engine.shutdown();
    served.context("server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
