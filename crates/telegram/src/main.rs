use relay_common::config::{ConfigSource, FileConfigSource};
use relay_common::logging;
use relay_engine::supervisor::run_pipeline;
use relay_engine::transport::Connector;
use relay_telegram::TelegramConnector;
use tokio_util::sync::CancellationToken;

/// Runs a single pipeline in the foreground, without the control API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let source = FileConfigSource::from_env();
    let config = source.load()?;

    // Held until exit so buffered log lines reach the file
    let _guard = logging::init_tracing(&config.logging)?;

    tracing::info!(config = %source.path().display(), "Reaction relay starting...");

    let session = TelegramConnector.connect(&config).await?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal, stopping gracefully...");
            shutdown.cancel();
        }
    });

    if let Err(e) = run_pipeline(config, session, cancel).await {
        tracing::error!(error = %e, "Pipeline exited with error");
        return Err(e.into());
    }

    tracing::info!("Reaction relay stopped.");
    Ok(())
}
