mod config;
mod services;
#[cfg(test)]
mod test_support;

use clap::Parser;
use config::ServerConfig;
use execlib::{Executor, Pipeline};
use std::future::Future;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::parse();
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    serve(listener, &config, shutdown_signal()).await
}

async fn serve(
    listener: TcpListener,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let exec_config = config.exec_config();
    let pipeline = Pipeline::new(&exec_config, config.isolation_policy())?;
    let executor = Executor::spawn(
        pipeline,
        exec_config.max_concurrent_jobs,
        exec_config.queue_capacity,
    );
    let app = services::execservice::router(executor, config.max_request_bytes);

    tracing::info!(
        addr = %listener.local_addr()?,
        timeout = ?exec_config.timeout,
        scratch_dir = %exec_config.scratch_dir.display(),
        isolation = ?config.isolation,
        "listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        // without a signal handler, run until killed
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
